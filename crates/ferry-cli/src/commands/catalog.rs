use super::{build_catalog, json_pretty, CatalogArgs, EXIT_SUCCESS};
use crate::config::FerryConfig;

pub fn run(args: &CatalogArgs, config: &FerryConfig, json: bool) -> Result<u8, String> {
    let source = args.source(config)?;
    let catalog = build_catalog(&source, json)?;

    if json {
        let entries: Vec<_> = catalog.entries().collect();
        let payload = serde_json::json!({
            "offline_suffix": catalog.offline_suffix(),
            "entries": entries,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    if catalog.is_empty() {
        println!("no offline artifacts found.");
        return Ok(EXIT_SUCCESS);
    }

    println!("{:<8} {:<48} {:<32} PATH", "KIND", "ID", "CAPTURE");
    for entry in catalog.entries() {
        let path = entry
            .path
            .as_ref()
            .map_or_else(|| "-".to_owned(), |p| p.display().to_string());
        println!(
            "{:<8} {:<48} {:<32} {path}",
            entry.kind.to_string(),
            entry.id.as_str(),
            entry.capture_name
        );
    }
    Ok(EXIT_SUCCESS)
}
