use clap::{Args, Parser, Subcommand};
use dealtrack::{AppConfig, Offer, OfferAggregator, OfferQuery};
use std::io::{self, Write};
use std::path::PathBuf;

/// Discounted and free games across Steam, Epic and GOG
#[derive(Parser)]
#[command(name = "dealtrack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ~/.dealtrack/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List discounted offers (default)
    Deals(DealsArgs),

    /// List games that are free right now
    Free {
        /// Comma-separated platforms: epic,steam,gog
        #[arg(long)]
        platforms: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Args, Default)]
struct DealsArgs {
    /// Minimum discount 0-100, or "free"
    #[arg(long)]
    discount: Option<String>,

    /// Match the discount exactly instead of as a minimum
    #[arg(long)]
    exact: bool,

    /// Comma-separated platforms: epic,steam,gog
    #[arg(long)]
    platforms: Option<String>,

    /// Include free-to-play titles (only with --discount free)
    #[arg(long)]
    include_free_to_play: bool,

    /// Resolve a display image for every offer
    #[arg(long)]
    images: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl DealsArgs {
    fn query(&self) -> dealtrack::Result<OfferQuery> {
        let exact = self.exact.then_some("true");
        let mut query =
            OfferQuery::from_params(self.discount.as_deref(), exact, self.platforms.as_deref())?;
        query.include_free_to_play = self.include_free_to_play;
        query.resolve_images = self.images;
        Ok(query)
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = AppConfig::load(self.config.as_deref())?;

        match self.command {
            Some(Commands::Config) => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            Some(Commands::Free { platforms, json }) => {
                let offers = OfferAggregator::from_config(&config)?
                    .get_free_offers(platforms.as_deref())
                    .await?;
                print_offers(&offers, json)
            }
            Some(Commands::Deals(args)) => run_deals(&config, &args).await,
            None => run_deals(&config, &DealsArgs::default()).await,
        }
    }
}

async fn run_deals(config: &AppConfig, args: &DealsArgs) -> anyhow::Result<()> {
    let query = args.query()?;
    let offers = OfferAggregator::from_config(config)?
        .get_offers(&query)
        .await;
    print_offers(&offers, args.json)
}

fn print_offers(offers: &[Offer], json: bool) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, offers)?;
        writeln!(out)?;
    } else if offers.is_empty() {
        writeln!(out, "No offers found")?;
    } else {
        for offer in offers {
            writeln!(out, "{}", format_offer(offer))?;
        }
    }
    Ok(())
}

/// One-line text rendering, e.g. `-75%   12.49 EUR (was 49.99)  [steam] ELDEN RING`
fn format_offer(offer: &Offer) -> String {
    let badge = match offer.discount_percent() {
        Some(d) => format!("-{}%", d),
        None => "F2P".to_string(),
    };
    let currency = offer.currency().unwrap_or("");
    let price = if offer.is_free_now() {
        format!("FREE (was {:.2})", offer.original_price())
    } else if offer.is_free_to_play() {
        "free-to-play".to_string()
    } else {
        format!(
            "{:.2} {} (was {:.2})",
            offer.current_price(),
            currency,
            offer.original_price()
        )
    };
    let mut line = format!("{:<5} {:<24} [{}] {}", badge, price, offer.platform(), offer.title());
    if let Some(ends) = offer.ends_at() {
        line.push_str(&format!(" (until {})", ends.format("%Y-%m-%d")));
    }
    line
}
