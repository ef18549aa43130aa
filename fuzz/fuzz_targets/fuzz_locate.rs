#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use stowaway::{locate, Probe};

// Arbitrary files must either be rejected or yield a self-consistent layout
fuzz_target!(|data: &[u8]| {
    let len = data.len() as u64;
    if let Ok(Probe::Present(layout)) = locate(&mut Cursor::new(data)) {
        assert!(layout.container_offset() <= layout.toc_offset);
        assert!(layout.data_offset <= layout.data_end);
        assert!(layout.container_end() <= len);
        for span in layout.spans() {
            assert!(span.offset + span.size <= layout.data_end);
        }
    }
});
