#![no_main]
use libfuzzer_sys::fuzz_target;
use stowaway::Toc;

fuzz_target!(|data: &[u8]| {
    if let Ok(toc) = Toc::from_bytes(data) {
        let encoded = toc.to_bytes().unwrap();
        let decoded = Toc::from_bytes(&encoded).unwrap();
        assert_eq!(decoded, toc);
    }
});
