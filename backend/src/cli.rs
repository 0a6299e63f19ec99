use clap::{Parser, Subcommand};
use retrieval::application::services::{
    COMBINED_INDEX, KNOWLEDGE_BASE_INDEX, PROMPT_TEMPLATE_INDEX,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rag-retrieval")]
#[command(about = "Build and query vector indexes for retrieval-augmented generation", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Data directory (overrides config and RAG_DATA_DIR)")]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Log at debug level")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Import knowledge base entries from a JSON array")]
    ImportKb {
        #[arg(help = "JSON file of knowledge entries")]
        path: PathBuf,

        #[arg(long, default_value = KNOWLEDGE_BASE_INDEX, help = "Target index")]
        index: String,

        #[arg(long, help = "Split long entries with the configured chunker")]
        chunked: bool,
    },

    #[command(about = "Import every markdown file under a directory as knowledge")]
    ImportKbDir {
        #[arg(help = "Directory searched recursively for .md files")]
        dir: PathBuf,

        #[arg(long, default_value = KNOWLEDGE_BASE_INDEX, help = "Target index")]
        index: String,

        #[arg(long, help = "Split long documents with the configured chunker")]
        chunked: bool,
    },

    #[command(about = "Import prompt templates from a JSON array")]
    ImportPrompts {
        #[arg(help = "JSON file of prompt templates")]
        path: PathBuf,

        #[arg(long, default_value = PROMPT_TEMPLATE_INDEX, help = "Target index")]
        index: String,
    },

    #[command(about = "Import knowledge entries and prompt templates into one index")]
    ImportAll {
        #[arg(long, help = "JSON file of knowledge entries")]
        kb: PathBuf,

        #[arg(long, help = "JSON file of prompt templates")]
        prompts: PathBuf,

        #[arg(long, default_value = COMBINED_INDEX, help = "Target index")]
        index: String,
    },

    #[command(about = "Re-embed every document of an index")]
    Rebuild {
        #[arg(help = "Index name")]
        index: String,
    },

    #[command(about = "Nearest-neighbour search over an index")]
    Search {
        #[arg(help = "Index name")]
        index: String,

        #[arg(help = "Query text")]
        query: String,

        #[arg(short = 'k', long, help = "Number of hits (defaults to config)")]
        top_k: Option<usize>,
    },

    #[command(about = "List registered indexes")]
    Indexes,

    #[command(about = "Delete an index, its documents and its artifact")]
    DeleteIndex {
        #[arg(help = "Index name")]
        index: String,
    },

    #[command(about = "Print the chunks a text file splits into")]
    Chunk {
        #[arg(help = "Text file to split")]
        path: PathBuf,

        #[arg(long, help = "Maximum chunk length in characters (defaults to config)")]
        size: Option<usize>,

        #[arg(long, help = "Characters carried between chunks (defaults to config)")]
        overlap: Option<usize>,
    },
}
