use docembed_core::{Document, DocumentEmbedderConfig};
use docembed_embed::DocumentEmbedder;

fn main() -> anyhow::Result<()> {
    let config = DocumentEmbedderConfig {
        meta_fields_to_embed: vec!["title".to_string()],
        normalize_embeddings: true,
        ..Default::default()
    };
    let mut embedder = DocumentEmbedder::new(config)?;
    embedder.warm_up()?;

    let mut docs = vec![
        Document::new("hello world").with_meta("title", "Greeting"),
        Document::new("rust embeddings"),
    ];
    embedder.run(&mut docs)?;
    for doc in &docs {
        let dim = doc.embedding.as_ref().map_or(0, Vec::len);
        println!("{} dim={}", doc.id, dim);
    }
    Ok(())
}
