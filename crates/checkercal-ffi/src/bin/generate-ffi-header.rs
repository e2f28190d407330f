use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let out = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| crate_dir.join("include").join("checkercal.h"));
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }

    cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("CHECKERCAL_H")
        .with_documentation(true)
        .generate()?
        .write_to_file(&out);
    println!("wrote {}", out.display());
    Ok(())
}
