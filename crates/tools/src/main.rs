use std::env;
use std::fs;
use std::path::Path;

use catalog::InMemoryRawLayerList;
use layers::LayerConfig;
use serde::Serialize;
use store::{AppStore, Category, ConfigDocument, SUBJECTLAYER_KEY};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let mut args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(usage());
    }

    let cmd = args[1].clone();
    args.drain(0..2);

    match cmd.as_str() {
        "tree" => cmd_tree(args),
        "params" => cmd_params(args),
        "category" => cmd_category(args),
        _ => Err(usage()),
    }
}

fn cmd_tree(args: Vec<String>) -> Result<(), String> {
    // portal tree <config.json> <catalog.json>
    if args.len() != 2 {
        return Err(usage());
    }
    let mut store = load_store(Path::new(&args[0]), Path::new(&args[1]))?;
    let registered = store.register_visible_layers();
    info!("{registered} visible layers instantiated");
    print_json(&store.state().layer_config)
}

fn cmd_params(args: Vec<String>) -> Result<(), String> {
    // portal params <config.json> <catalog.json>
    if args.len() != 2 {
        return Err(usage());
    }
    let store = load_store(Path::new(&args[0]), Path::new(&args[1]))?;
    print_json(&store.state().layer_url_params())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryOutput<'a> {
    category: &'a Category,
    subjectlayer: &'a [LayerConfig],
}

fn cmd_category(args: Vec<String>) -> Result<(), String> {
    // portal category <config.json> <catalog.json> [key]
    if args.len() < 2 || args.len() > 3 {
        return Err(usage());
    }
    let key = args
        .get(2)
        .cloned()
        .or_else(|| env_var_string("PORTAL_CATEGORY"))
        .ok_or_else(|| "category requires a key (argument or PORTAL_CATEGORY)".to_string())?;

    let mut store = load_store(Path::new(&args[0]), Path::new(&args[1]))?;
    let category = store
        .state()
        .all_categories()
        .iter()
        .find(|c| c.key == key)
        .cloned()
        .ok_or_else(|| format!("unknown category: {key}"))?;
    store.change_category(&category);

    let state = store.state();
    let output = CategoryOutput {
        category: state
            .all_categories()
            .iter()
            .find(|c| c.key == key)
            .unwrap_or(&category),
        subjectlayer: state.layer_configs_by_parent_key(SUBJECTLAYER_KEY),
    };
    print_json(&output)
}

fn load_store(config_path: &Path, catalog_path: &Path) -> Result<AppStore, String> {
    let raw_config =
        fs::read_to_string(config_path).map_err(|e| format!("read {config_path:?}: {e}"))?;
    let mut document = ConfigDocument::from_json_str(&raw_config)
        .map_err(|e| format!("parse {config_path:?}: {e}"))?;

    let raw_catalog =
        fs::read_to_string(catalog_path).map_err(|e| format!("read {catalog_path:?}: {e}"))?;
    let catalog = InMemoryRawLayerList::from_json_str(&raw_catalog)
        .map_err(|e| format!("parse {catalog_path:?}: {e}"))?;

    if let Some(key) = env_var_string("PORTAL_CATEGORY") {
        activate_category(&mut document, &key)?;
    }

    info!(
        "loaded {} partitions from {config_path:?}, {} catalog layers from {catalog_path:?}",
        document.layer_config.len(),
        catalog.len()
    );

    let mut store = AppStore::new(catalog);
    store.process_config_json_onload(document);
    Ok(store)
}

fn activate_category(document: &mut ConfigDocument, key: &str) -> Result<(), String> {
    let categories = &mut document.portal_config.tree.categories;
    if !categories.iter().any(|c| c.key == key) {
        return Err(format!("PORTAL_CATEGORY names unknown category: {key}"));
    }
    for category in categories.iter_mut() {
        category.active = Some(category.key == key);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| format!("serialize: {e}"))?;
    println!("{out}");
    Ok(())
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn usage() -> String {
    let exe = env::args().next().unwrap_or_else(|| "portal".to_string());
    format!(
        "Usage:\n  {exe} tree <config.json> <catalog.json>\n  {exe} params <config.json> <catalog.json>\n  {exe} category <config.json> <catalog.json> [key]\n\nNotes:\n- PORTAL_CATEGORY selects the active category before the tree is built.\n- RUST_LOG controls log output on stderr.\n"
    )
}
