use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use imagesearch::{
    init, render_grid, utils, DiskLoader, GridOptions, SearchConfig, SearchMethod,
    SimilaritySearch,
};

/// Find the images in a directory that look most like a chosen one
#[derive(Parser, Debug)]
#[command(name = "imagesearch")]
#[command(version, about, long_about = None)]
struct Args {
    /// File name of the chosen image, relative to the directory
    #[arg(short, long)]
    image: String,

    /// Directory containing the images
    #[arg(short, long, default_value = "data/flowers")]
    directory: PathBuf,

    /// Number of similar images to return [default: IMAGESEARCH_K or 5]
    #[arg(short, long)]
    number: Option<usize>,

    /// Output directory for the CSV and the plot
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// Similarity model: histogram or embedding [default: IMAGESEARCH_METHOD or histogram]
    #[arg(short, long)]
    method: Option<String>,

    /// TorchScript feature model (embedding method)
    #[arg(long)]
    model: Option<PathBuf>,

    /// TrueType font for plot captions
    #[arg(long)]
    font: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init()?;

    let config = apply_args(SearchConfig::from_env()?, &args)?;

    utils::ensure_dir_exists(&args.output)?;

    let images = utils::list_images(&args.directory)
        .with_context(|| format!("listing {}", args.directory.display()))?;
    let query = args.directory.join(&args.image);
    if !images.contains(&query) {
        log::warn!("{} is not among the listed images", query.display());
    }

    let mut search = SimilaritySearch::new(config.clone());
    if config.method == SearchMethod::Embedding {
        search = attach_model(search, args.model.as_deref())?;
    }

    let ranked = search.search(&query, &images)?;

    let stem = utils::output_stem(config.k, &query);
    let csv_path = args.output.join(format!("{}.csv", stem));
    ranked.save_csv(&csv_path)?;
    log::info!("Wrote {}", csv_path.display());

    let mut options = GridOptions::default();
    if let Some(font) = &args.font {
        options = options.with_font_file(font)?;
    }
    let plot_path = args.output.join(format!("{}.png", stem));
    render_grid(&ranked, &DiskLoader, &options)?.save(&plot_path)?;
    log::info!("Wrote {}", plot_path.display());

    Ok(())
}

/// Flags given on the command line win over `.env` and the environment
fn apply_args(mut config: SearchConfig, args: &Args) -> anyhow::Result<SearchConfig> {
    if let Some(method) = &args.method {
        config.method = method.parse::<SearchMethod>()?;
    }
    if let Some(number) = args.number {
        config.k = number;
    }
    Ok(config)
}

#[cfg(feature = "embeddings")]
fn attach_model(
    search: SimilaritySearch,
    model: Option<&std::path::Path>,
) -> anyhow::Result<SimilaritySearch> {
    let Some(path) = model else {
        bail!("--model is required for the embedding method");
    };
    Ok(search.with_model(imagesearch::TorchModel::load(path)?))
}

#[cfg(not(feature = "embeddings"))]
fn attach_model(
    _search: SimilaritySearch,
    _model: Option<&std::path::Path>,
) -> anyhow::Result<SimilaritySearch> {
    bail!("this build has no embedding support; rebuild with the `embeddings` feature")
}
