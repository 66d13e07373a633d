use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use story_core::constants::DATE_FORMAT;
use story_core::{
    parse_date, Clock, CoreConfig, EventRelay, StoryStore, SystemClock, DEFAULT_STORY_DATA_DIR,
};

#[derive(Parser)]
#[command(name = "story")]
#[command(about = "Collaborative story service CLI")]
struct Cli {
    /// Storage directory (defaults to STORY_DATA_DIR, then "story_data")
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the story for a date (today if omitted)
    Show {
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// Print the authors for a date (today if omitted)
    Authors {
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// List every date with a story on record
    Dates,
    /// Send a diagnostic datagram to the visualisation consumer
    Ping {
        /// Consumer host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Consumer UDP port
        #[arg(long, default_value_t = 7000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.unwrap_or_else(|| {
        PathBuf::from(
            std::env::var("STORY_DATA_DIR").unwrap_or_else(|_| DEFAULT_STORY_DATA_DIR.into()),
        )
    });
    let open_store = || -> Result<StoryStore, Box<dyn std::error::Error>> {
        Ok(StoryStore::open(Arc::new(CoreConfig::new(data_dir.clone())?))?)
    };

    match cli.command {
        Some(Commands::Show { date }) => {
            let store = open_store()?;
            match date {
                None => println!("{}", store.full_text(SystemClock.today())?),
                Some(date) => match store.document_on(parse_date(&date)?)? {
                    Some(doc) => println!("{}", doc.full_text()),
                    None => eprintln!("No story on record for {}", date),
                },
            }
        }
        Some(Commands::Authors { date }) => {
            let store = open_store()?;
            let record = match date {
                None => Some(store.authors(SystemClock.today())?),
                Some(date) => store.authors_on(parse_date(&date)?)?,
            };
            match record {
                Some(record) if record.names.is_empty() => println!("No contributions yet."),
                Some(record) => {
                    for (i, name) in record.names.iter().enumerate() {
                        let name = if name.is_empty() { "(anonymous)" } else { name };
                        println!("{:>4}  {}", i + 1, name);
                    }
                }
                None => eprintln!("No authors on record for that date"),
            }
        }
        Some(Commands::Dates) => {
            let dates = open_store()?.dates()?;
            if dates.is_empty() {
                println!("No stories found.");
            } else {
                for date in dates {
                    println!("{}", date.format(DATE_FORMAT));
                }
            }
        }
        Some(Commands::Ping { host, port }) => {
            let target = tokio::net::lookup_host((host.as_str(), port))
                .await?
                .next()
                .ok_or("consumer host did not resolve")?;
            let relay = EventRelay::bind(target, false).await?;
            match relay.ping().await {
                Ok(()) => println!("Ping sent to {}", target),
                Err(e) => eprintln!("Error sending ping: {}", e),
            }
        }
        None => {
            println!("Use 'story --help' for commands");
        }
    }

    Ok(())
}
