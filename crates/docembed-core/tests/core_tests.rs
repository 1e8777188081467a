use std::fs;
use tempfile::TempDir;

use docembed_core::config::Settings;
use docembed_core::{ComponentDevice, Device, Secret};

#[test]
fn settings_from_file_reads_document_section() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("docembed.toml");
    fs::write(
        &path,
        r#"
[document_embedder]
model = "/opt/models/bge-small"
batch_size = 8
normalize_embeddings = true
meta_fields_to_embed = ["title", "lang"]
embedding_separator = " | "
device = { type = "single", device = "cpu" }
token = { type = "env_var", env_vars = ["MY_HUB_TOKEN"], strict = false }
"#,
    )
    .unwrap();

    let settings = Settings::from_file(&path).expect("settings");
    let config = settings.document_embedder().expect("document config");

    assert_eq!(config.backend.model, "/opt/models/bge-small");
    assert_eq!(config.batch_size, 8);
    assert!(config.normalize_embeddings);
    assert!(config.progress_bar, "unset fields keep their defaults");
    assert_eq!(config.meta_fields_to_embed, vec!["title", "lang"]);
    assert_eq!(config.embedding_separator, " | ");
    assert_eq!(config.backend.device, Some(ComponentDevice::from_single(Device::Cpu)));
    assert_eq!(config.backend.token, Some(Secret::from_env_vars(["MY_HUB_TOKEN"], false)));
}

#[test]
fn missing_section_yields_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("empty.toml");
    fs::write(&path, "").unwrap();

    let settings = Settings::from_file(&path).expect("settings");
    let text = settings.text_embedder().expect("text config");
    assert_eq!(text, Default::default());
}

#[test]
fn invalid_batch_size_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.toml");
    fs::write(&path, "[text_embedder]\nbatch_size = 0\n").unwrap();

    let settings = Settings::from_file(&path).expect("settings");
    assert!(settings.text_embedder().is_err());
}

#[test]
fn missing_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    assert!(Settings::from_file(&tmp.path().join("nope.toml")).is_err());
}
