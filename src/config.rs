//! Build-time pool parameters, generated by `build.rs` from `rtsysmem.toml`
//! (or the file named by `RTSYSMEM_CONFIG`).

include!(concat!(env!("OUT_DIR"), "/config_gen.rs"));

const _: () = assert!(MIN_ALIGN.is_power_of_two());
const _: () = assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
const _: () = assert!(MAX_REGIONS >= 2);
