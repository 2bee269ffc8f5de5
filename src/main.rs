//! Command line front end for the business card gallery
//!
//! Resolves one gallery view against a chain node (or a generated in-memory
//! collection with `--demo`) and prints the loaded cards.

use anyhow::{bail, Context, Result};
use bcard_gallery::chain::memory::InMemoryCollection;
use bcard_gallery::gallery::{GalleryBuilder, GalleryEvent, GallerySnapshot, ModeSwitch};
use bcard_gallery::{Address, FilterQuery};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "bcard-gallery", about = "Browse NFT business cards by view mode and attributes")]
struct Args {
    /// JSON-RPC endpoint of the chain node
    #[arg(long, default_value = "http://127.0.0.1:8545")]
    rpc_url: String,

    /// Business card (ERC-721 Enumerable) contract address
    #[arg(long)]
    ledger: Option<String>,

    /// Marketplace contract address
    #[arg(long)]
    marketplace: Option<String>,

    /// Connected account
    #[arg(long)]
    account: Option<String>,

    /// Show the account's cards
    #[arg(long)]
    owned: bool,

    /// Show marketplace listings
    #[arg(long)]
    listings: bool,

    /// JSON file holding an attribute search
    #[arg(long)]
    search: Option<PathBuf>,

    /// Scroll pages to load after the first page
    #[arg(long, default_value = "0")]
    pages: usize,

    /// Use a generated in-memory collection of this many cards
    #[arg(long)]
    demo: Option<u64>,

    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let search = match &args.search {
        Some(path) => Some(read_search(path)?),
        None => None,
    };
    check_flags(&args)?;
    let account = args
        .account
        .as_deref()
        .map(|raw| raw.trim().parse::<Address>())
        .transpose()
        .context("invalid --account")?;

    let mut gallery = match args.demo {
        Some(supply) => {
            let owner = account.unwrap_or(Address::with_last_byte(0xa1));
            info!("Generating a demo collection of {} cards owned by {}", supply, owner);
            let collection = InMemoryCollection::demo(supply, &owner);
            GalleryBuilder::new()
                .build_in_memory(&collection)
                .context("failed to build the demo gallery")?
        }
        None => {
            let (Some(ledger), Some(marketplace)) = (&args.ledger, &args.marketplace) else {
                bail!("--ledger and --marketplace are required unless --demo is given");
            };
            GalleryBuilder::new()
                .with_rpc_url(args.rpc_url.clone())
                .with_contracts(ledger.clone(), marketplace.clone())
                .connect()
                .context("failed to connect the gallery")?
        }
    };

    let setup = [
        GalleryEvent::AccountChanged(account),
        GalleryEvent::ModeChanged(ModeSwitch::Owned(args.owned)),
        GalleryEvent::ModeChanged(ModeSwitch::Marketplace(args.listings)),
        GalleryEvent::SearchChanged(search),
    ];
    for event in setup {
        // Each switch only updates state here; one refresh resolves the view.
        let _ = gallery.transition(event);
    }
    gallery
        .dispatch(GalleryEvent::Refresh)
        .await
        .context("failed to resolve the gallery")?;

    for _ in 0..args.pages {
        if gallery.snapshot().exhausted() {
            break;
        }
        gallery
            .dispatch(GalleryEvent::ScrollThreshold)
            .await
            .context("failed to load the next page")?;
    }

    print_snapshot(&gallery.snapshot());
    Ok(())
}

/// Reject flag combinations the gallery would silently ignore.
fn check_flags(args: &Args) -> Result<()> {
    if args.owned && args.account.is_none() {
        bail!("--owned requires --account");
    }
    Ok(())
}

fn read_search(path: &Path) -> Result<FilterQuery> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read search file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid search in {}", path.display()))
}

fn print_snapshot(snapshot: &GallerySnapshot) {
    println!(
        "{} view: showing {} of {} cards",
        snapshot.mode,
        snapshot.loaded.len(),
        snapshot.candidate_count
    );
    for card in &snapshot.loaded {
        let name = card.metadata.name.as_deref().unwrap_or("(unnamed)");
        match &card.listing {
            Some(listing) => println!(
                "  {:<6} {:<28} listed by {} for {} wei",
                card.id.to_string(),
                name,
                listing.seller,
                listing.price
            ),
            None => println!("  {:<6} {}", card.id.to_string(), name),
        }
    }
}
