//! Demo of exporting a dataset into an archive and importing it elsewhere.
//!
//! Usage: RUST_LOG=debug cargo run -p knowledge-datastore --example export_import

use std::sync::Arc;

use knowledge_datastore::knowledge_embeddings::HashEmbeddingProvider;
use knowledge_datastore::knowledge_index::Dataset;
use knowledge_datastore::{Datastore, DatastoreConfig, FixedDataDir};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let workdir = tempfile::tempdir()?;
    let provider = Arc::new(HashEmbeddingProvider::new());

    println!("📚 Knowledge Datastore Export/Import Demo\n");

    // Source datastore with one dataset; KNOW_* variables override its DSNs
    let source = Datastore::builder()
        .with_config(DatastoreConfig::from_env())
        .with_data_dirs(Arc::new(FixedDataDir::new(workdir.path().join("source"))))
        .with_embedding_provider(provider.clone())
        .build()
        .await?;

    source.create_dataset(Dataset::new("recipes")).await?;
    let file = source
        .ingest(
            "recipes",
            "/recipes/bread.md",
            vec![
                "Mix flour, water, salt and yeast.".to_string(),
                "Bake for forty minutes at high heat.".to_string(),
            ],
        )
        .await?;
    println!("   ✓ Ingested {} ({} chunks)", file.absolute_path, file.documents.len());

    // Export into a directory; the archive name is generated
    let archive = source
        .export_datasets_to_file(workdir.path(), &["recipes".to_string()])
        .await?;
    println!("   ✓ Exported to {}\n", archive.display());

    // Import into a second datastore
    let target = Datastore::builder()
        .with_data_dirs(Arc::new(FixedDataDir::new(workdir.path().join("target"))))
        .with_embedding_provider(provider.clone())
        .build()
        .await?;
    target
        .import_datasets_from_file(&archive, &["recipes".to_string()])
        .await?;

    for dataset in target.list_datasets().await? {
        println!("   • dataset {}", dataset.id);
    }

    let hits = target.retrieve("recipes", "how long to bake", 1).await?;
    for hit in &hits {
        println!("   🔎 {:.3} {}", hit.score, hit.content);
    }

    // Or open the archive directly without importing it
    let snapshot = Datastore::open_archive(&archive, provider).await?;
    println!(
        "\n   ✓ Archive holds {} dataset(s)",
        snapshot.list_datasets().await?.len()
    );

    Ok(())
}
