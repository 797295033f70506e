use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Default)]
struct PoolSection {
    page_size: Option<usize>,
    min_align: Option<usize>,
    pool_size: Option<usize>,
    max_regions: Option<usize>,
}

#[derive(Deserialize, Default)]
struct Config {
    #[serde(default)]
    pool: PoolSection,
}

struct ResolvedConfig {
    page_size: usize,
    page_shift: u32,
    min_align: usize,
    pool_size: usize,
    max_regions: usize,
}

fn resolve_config(cfg: &PoolSection) -> ResolvedConfig {
    let page_size = cfg.page_size.unwrap_or(4096);
    assert!(
        page_size > 0 && page_size.is_power_of_two(),
        "page_size ({}) must be a power of 2",
        page_size
    );

    let min_align = cfg.min_align.unwrap_or(16);
    assert!(
        min_align > 0 && min_align.is_power_of_two(),
        "min_align ({}) must be a power of 2",
        min_align
    );
    assert!(
        min_align <= page_size,
        "min_align ({}) must be <= page_size ({})",
        min_align,
        page_size
    );

    let pool_size = cfg.pool_size.unwrap_or(1024 * 1024);
    assert!(pool_size > 0, "pool_size must be > 0");
    assert!(
        pool_size % min_align == 0,
        "pool_size ({}) must be a multiple of min_align ({})",
        pool_size,
        min_align
    );

    let max_regions = cfg.max_regions.unwrap_or(256);
    assert!(max_regions >= 2, "max_regions ({}) must be >= 2", max_regions);

    ResolvedConfig {
        page_size,
        page_shift: page_size.trailing_zeros(),
        min_align,
        pool_size,
        max_regions,
    }
}

fn default_config_path() -> String {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    format!("{}/rtsysmem.toml", manifest_dir)
}

fn generate_config(cfg: &ResolvedConfig, out_path: &Path) {
    let code = format!(
        "// Auto-generated by build.rs. Do not edit.\n\n\
         pub const PAGE_SHIFT: usize = {};\n\
         pub const PAGE_SIZE: usize = {};\n\
         pub const MIN_ALIGN: usize = {};\n\
         pub const DEFAULT_POOL_SIZE: usize = {};\n\
         pub const MAX_REGIONS: usize = {};\n",
        cfg.page_shift, cfg.page_size, cfg.min_align, cfg.pool_size, cfg.max_regions,
    );
    fs::write(out_path, code).expect("failed to write config_gen.rs");
}

fn main() {
    println!("cargo:rerun-if-env-changed=RTSYSMEM_CONFIG");

    let out_dir = env::var("OUT_DIR").unwrap();

    let config_path = env::var("RTSYSMEM_CONFIG").unwrap_or_else(|_| default_config_path());
    println!("cargo:rerun-if-changed={}", config_path);
    let content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", config_path, e));

    let config: Config = toml::from_str(&content).expect("failed to parse TOML config");

    let resolved = resolve_config(&config.pool);
    generate_config(&resolved, &Path::new(&out_dir).join("config_gen.rs"));
}
