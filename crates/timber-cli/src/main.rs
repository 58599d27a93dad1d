// ============================================================================
// timber — terminal client for the Timber hunting land marketplace
// ============================================================================
// Usage:
//   timber status                             Connection mode and store stats
//   timber search [--location X] [--max-price N] ...
//   timber login --simulate hunter|landowner  Sign in as a local identity
//   timber login --email you@example.com      Magic link (or simulated login)
//   timber login --google                     Google sign-in URL (or simulated hunter)
//   timber onboard landowner|hunter|admin     Choose a role
//   timber add-listing --title ... --location ... --price N --acreage N
//   timber simulation on|off|reset            Force, release, or reset session storage
// ============================================================================

use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::time::Duration;
use timber_core::seed::{canonical_tag, ACCOMMODATIONS, GAME_TYPES, SPORTING_ARMS};
use timber_core::{
    AccessLevel, CardDetails, Coordinates, Listing, ListingDraft, Marketplace, RoleGate, Route,
    SearchFilters, SignInOutcome, TimberConfig, UserRole, View,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Timber marketplace client
#[derive(Parser)]
#[command(name = "timber", version, about = "Browse and manage Timber hunting land listings")]
struct Cli {
    /// Path to the database file (default: ~/.timber/timber.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show connection mode, current user, and store statistics
    Status,

    /// Search listings
    Search {
        /// Text matched against title and description
        #[arg(long, default_value = "")]
        query: String,

        #[arg(long, default_value = "")]
        location: String,

        /// Game type (repeatable)
        #[arg(long = "game")]
        game_types: Vec<String>,

        /// Required accommodation (repeatable, all must match)
        #[arg(long = "accommodation")]
        accommodations: Vec<String>,

        /// Sporting arm (repeatable)
        #[arg(long = "arm")]
        sporting_arms: Vec<String>,

        #[arg(long)]
        max_price: Option<u32>,

        #[arg(long)]
        max_acreage: Option<u32>,
    },

    /// Show one listing
    Show { id: String },

    /// Sign in
    Login {
        /// Simulated identity: hunter or landowner
        #[arg(long, conflicts_with_all = ["email", "google"])]
        simulate: Option<String>,

        /// Email for a magic link
        #[arg(long, conflicts_with = "google")]
        email: Option<String>,

        /// Sign in with Google
        #[arg(long)]
        google: bool,

        /// Where Google sends the browser back to
        #[arg(long, requires = "google")]
        redirect_to: Option<String>,
    },

    /// Choose a role for a new account: landowner, hunter, or admin
    Onboard { role: String },

    /// Show the signed-in user
    Whoami,

    Logout,

    /// Buy a hunter membership ($60/year) with a test card
    Upgrade {
        #[arg(long)]
        card: String,

        /// MM/YY
        #[arg(long)]
        expiry: String,

        #[arg(long)]
        cvc: String,
    },

    /// Submit a new property
    AddListing {
        #[arg(long)]
        title: String,

        #[arg(long)]
        location: String,

        /// Price per day in dollars
        #[arg(long)]
        price: u32,

        #[arg(long)]
        acreage: u32,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long = "game")]
        game_types: Vec<String>,

        #[arg(long = "arm")]
        sporting_arms: Vec<String>,

        /// Replaces the default features when given
        #[arg(long = "feature")]
        features: Vec<String>,

        #[arg(long = "accommodation")]
        accommodations: Vec<String>,

        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
    },

    /// Mark a listing verified (admin)
    Verify { id: String },

    /// Remove a listing (admin)
    Delete { id: String },

    /// Save or unsave a listing (hunter)
    Save { id: String },

    /// Show the dashboard for the current role
    Dashboard {
        /// Admin only: filter by title or location
        #[arg(long, default_value = "")]
        search: String,
    },

    /// List conversations
    Messages {
        /// Keep polling for this many seconds before listing
        #[arg(long)]
        watch: Option<u64>,
    },

    /// Message a listing's landowner (or `--to` someone else)
    Send {
        listing_id: String,
        text: String,

        #[arg(long)]
        to: Option<String>,
    },

    /// Force (on) or release (off) simulated mode, or reset session storage
    Simulation { state: String },
}

fn parse_role(s: &str) -> Result<UserRole> {
    match UserRole::from_str(s) {
        Some(role) => Ok(role),
        None => bail!("Unknown role '{}'. Valid values: landowner, hunter, admin", s),
    }
}

/// Map user-typed tags onto the catalogue spelling
fn canonical_tags(
    raw: Vec<String>,
    vocabulary: &[&'static str],
    flag: &str,
) -> Result<Vec<String>> {
    let mut tags = Vec::with_capacity(raw.len());
    for value in raw {
        let Some(tag) = canonical_tag(vocabulary, &value) else {
            bail!(
                "Unknown --{} '{}'. Valid values: {}",
                flag,
                value,
                vocabulary.join(", ")
            );
        };
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    Ok(tags)
}

fn format_timestamp(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ms))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_listings<'a>(listings: impl IntoIterator<Item = &'a Listing>) {
    println!(
        "{:<16}  {:<34}  {:<28}  {:>7}  {:>7}  {}",
        "ID", "TITLE", "LOCATION", "$/DAY", "ACRES", "VERIFIED"
    );
    println!("{}", "-".repeat(110));

    let mut total = 0;
    for listing in listings {
        total += 1;
        let title: String = listing.title.chars().take(34).collect();
        let location: String = listing.location.chars().take(28).collect();
        println!(
            "{:<16}  {:<34}  {:<28}  {:>7}  {:>7}  {}",
            listing.id,
            title,
            location,
            listing.price_per_day,
            listing.acreage,
            if listing.is_verified { "yes" } else { "pending" }
        );
    }
    println!("\nTotal: {} listings", total);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("timber_core=warn".parse()?)
                .add_directive("timber_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = TimberConfig::from_env();
    if let Some(path) = &cli.db_path {
        config = config.with_db_path(path);
    }
    let mut market = Marketplace::start(config).await?;
    debug!("Marketplace ready in {} mode", market.connection().mode_label());

    match cli.command {
        Commands::Status => cmd_status(&market, cli.json),
        Commands::Search {
            query,
            location,
            game_types,
            accommodations,
            sporting_arms,
            max_price,
            max_acreage,
        } => {
            let defaults = SearchFilters::default();
            market.set_filters(SearchFilters {
                query,
                location,
                game_types: canonical_tags(game_types, GAME_TYPES, "game")?,
                accommodations: canonical_tags(accommodations, ACCOMMODATIONS, "accommodation")?,
                sporting_arms: canonical_tags(sporting_arms, SPORTING_ARMS, "arm")?,
                max_price: max_price.unwrap_or(defaults.max_price),
                max_acreage: max_acreage.unwrap_or(defaults.max_acreage),
                ..defaults
            });
            let hits = market.filtered_listings();
            if cli.json {
                return print_json(&hits);
            }
            print_listings(&hits);
            Ok(())
        }
        Commands::Show { id } => cmd_show(&market, &id, cli.json),
        Commands::Login {
            simulate,
            email,
            google,
            redirect_to,
        } => {
            if google {
                cmd_google_login(&market, redirect_to.as_deref())
            } else {
                cmd_login(&market, simulate, email).await
            }
        }
        Commands::Onboard { role } => {
            let user = market.select_role(parse_role(&role)?).await?;
            println!("Welcome, {}. You are now a {}.", user.name, role);
            Ok(())
        }
        Commands::Whoami => cmd_whoami(&market, cli.json),
        Commands::Logout => {
            market.logout().await?;
            println!("Signed out.");
            Ok(())
        }
        Commands::Upgrade { card, expiry, cvc } => {
            println!("Processing $60.00 membership payment...");
            let receipt = market
                .upgrade_membership(&CardDetails::new(&card, &expiry, &cvc))
                .await?;
            if cli.json {
                return print_json(&receipt);
            }
            println!(
                "Payment {} succeeded (card ending {}). Direct messaging is now unlocked.",
                receipt.reference, receipt.card_last4
            );
            Ok(())
        }
        Commands::AddListing {
            title,
            location,
            price,
            acreage,
            description,
            game_types,
            sporting_arms,
            features,
            accommodations,
            lat,
            lng,
        } => {
            let mut draft = ListingDraft {
                title,
                location,
                price_per_day: price,
                acreage,
                description,
                game_types: canonical_tags(game_types, GAME_TYPES, "game")?,
                sporting_arms: canonical_tags(sporting_arms, SPORTING_ARMS, "arm")?,
                accommodations: canonical_tags(accommodations, ACCOMMODATIONS, "accommodation")?,
                coordinates: lat.zip(lng).map(|(lat, lng)| Coordinates { lat, lng }),
                ..ListingDraft::default()
            };
            if !features.is_empty() {
                draft.features = features;
            }
            let listing = market.add_listing(draft).await?;
            println!("Created listing {} ({})", listing.id, listing.title);
            Ok(())
        }
        Commands::Verify { id } => {
            market.verify_listing(&id)?;
            println!("Listing {} verified.", id);
            Ok(())
        }
        Commands::Delete { id } => {
            let removed = market.delete_listing(&id)?;
            println!("Deleted listing {} ({}).", removed.id, removed.title);
            Ok(())
        }
        Commands::Save { id } => {
            let saved = market.toggle_saved(&id)?;
            println!("Listing {} {}.", id, if saved { "saved" } else { "removed from saved" });
            Ok(())
        }
        Commands::Dashboard { search } => cmd_dashboard(&market, &search, cli.json),
        Commands::Messages { watch } => {
            if let Some(secs) = watch {
                market.start_message_polling();
                tokio::time::sleep(Duration::from_secs(secs)).await;
                market.stop_message_polling().await;
            }
            cmd_messages(&market, cli.json).await
        }
        Commands::Send { listing_id, text, to } => {
            if market.send_message(&listing_id, to.as_deref(), &text).await? {
                println!("Message sent.");
            } else {
                println!("Simulated mode: message not sent.");
            }
            Ok(())
        }
        Commands::Simulation { state } => {
            let market = match state.to_lowercase().as_str() {
                "on" | "true" => market.toggle_forced_simulation(true).await?,
                "off" | "false" => market.toggle_forced_simulation(false).await?,
                "reset" => market.reset_session_storage().await?,
                _ => bail!("Unknown state '{}'. Valid values: on, off, reset", state),
            };
            println!("Mode is now {}.", market.connection().mode_label());
            Ok(())
        }
    }
}

fn cmd_status(market: &Marketplace, json: bool) -> Result<()> {
    let status = market.status()?;
    if json {
        return print_json(&status);
    }

    println!("=== Timber Marketplace Status ===");
    println!("Mode:        {}", status.mode);
    if let Some(backend) = status.backend {
        println!("Backend:     {}", backend);
    }
    let keys = if status.has_keys {
        "configured"
    } else {
        "missing"
    };
    let simulation = if status.simulation_forced {
        "forced"
    } else {
        "not forced"
    };
    println!("Keys:        {}", keys);
    println!("Simulation:  {}", simulation);
    println!("Session:     {}", status.phase);
    match &status.user {
        Some(user) => println!("User:        {} <{}>", user.name, user.email),
        None => println!("User:        (signed out)"),
    }
    println!("Listings:    {}", status.listings);
    println!();
    println!("Local records:      {}", status.store.local_records);
    println!("Session records:    {}", status.store.session_records);
    println!("Simulated listings: {}", status.store.simulated_listings);
    Ok(())
}

fn cmd_show(market: &Marketplace, id: &str, json: bool) -> Result<()> {
    let Some(listing) = market.listing(id) else {
        bail!("No listing with id '{}'", id);
    };
    if json {
        return print_json(listing);
    }

    println!("{} ({})", listing.title, listing.id);
    println!("{}", listing.location);
    println!(
        "${}/day · {} acres · {:.1}★ ({} reviews){}",
        listing.price_per_day,
        listing.acreage,
        listing.rating,
        listing.reviews,
        if listing.is_verified { " · verified" } else { "" }
    );
    println!("Landowner:      {}", listing.landowner.name);
    println!("Game:           {}", listing.game_types.join(", "));
    println!("Sporting arms:  {}", listing.sporting_arms.join(", "));
    println!("Features:       {}", listing.features.join(", "));
    println!("Accommodations: {}", listing.accommodations.join(", "));
    if !listing.description.is_empty() {
        println!("\n{}", listing.description);
    }
    Ok(())
}

async fn cmd_login(
    market: &Marketplace,
    simulate: Option<String>,
    email: Option<String>,
) -> Result<()> {
    match (simulate, email) {
        (Some(role), _) => {
            let user = market.sign_in_simulated(parse_role(&role)?)?;
            println!("Signed in as {} ({}).", user.name, user.id);
        }
        (None, Some(email)) => match market.sign_in_with_email(&email).await {
            Ok(SignInOutcome::SignedIn(user)) => {
                println!("Signed in as {} ({}).", user.name, user.id);
                if user.needs_onboarding() {
                    println!("Choose a role next: timber onboard <landowner|hunter|admin>");
                }
            }
            Ok(SignInOutcome::MagicLinkSent { email }) => {
                println!("Check {} for a sign-in link.", email);
            }
            Ok(SignInOutcome::Redirect { url }) => {
                println!("Open {} to continue.", url);
            }
            Err(e) if e.is_rate_limit() => {
                bail!(
                    "{}\nTry `timber login --simulate hunter` or `--simulate landowner` instead.",
                    e
                );
            }
            Err(e) => return Err(e.into()),
        },
        (None, None) => bail!("Pass --simulate <role> or --email <address>"),
    }
    Ok(())
}

fn cmd_google_login(market: &Marketplace, redirect_to: Option<&str>) -> Result<()> {
    match market.sign_in_with_google(redirect_to)? {
        SignInOutcome::SignedIn(user) => {
            println!("Simulated mode: signed in as {} ({}).", user.name, user.id);
        }
        SignInOutcome::Redirect { url } => {
            println!("Open this URL to sign in with Google:\n{}", url);
        }
        SignInOutcome::MagicLinkSent { email } => {
            println!("Check {} for a sign-in link.", email);
        }
    }
    Ok(())
}

fn cmd_whoami(market: &Marketplace, json: bool) -> Result<()> {
    let user = market.current_user();
    if json {
        return print_json(&user);
    }
    match user {
        Some(user) => {
            println!("{} <{}>", user.name, user.email);
            println!("id:     {}", user.id);
            println!(
                "role:   {}",
                user.role.map(|r| r.to_string()).unwrap_or_else(|| "(not chosen)".into())
            );
            println!("member: {}", if user.is_member { "yes" } else { "no" });
            println!("access: {}", AccessLevel::for_user(Some(&user)).display_name());
            let features: Vec<_> = RoleGate::available_features(Some(&user))
                .iter()
                .map(|f| f.display_name())
                .collect();
            println!("can:    {}", features.join(", "));
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

fn cmd_dashboard(market: &Marketplace, search: &str, json: bool) -> Result<()> {
    let view = market.current_view(&Route::Dashboard);
    match &view {
        View::Onboarding => bail!("Choose a role first: timber onboard <landowner|hunter|admin>"),
        View::LandownerDashboard => {
            let mine = market.my_listings();
            if json {
                return print_json(&mine);
            }
            println!("=== {}: Your Properties ===", view.display_name());
            print_listings(mine);
        }
        View::HunterDashboard => {
            let saved = market.saved_listings();
            if json {
                return print_json(&saved);
            }
            println!("=== {}: Saved Listings ===", view.display_name());
            print_listings(saved);
        }
        View::AdminDashboard => {
            let summary = market.dashboard_summary();
            let hits = market.admin_search(search);
            if json {
                return print_json(&serde_json::json!({ "summary": summary, "listings": hits }));
            }
            println!("=== {} ===", view.display_name());
            println!(
                "{} listings · {} verified · {} pending · avg ${:.0}/day\n",
                summary.total, summary.verified, summary.pending, summary.average_price
            );
            print_listings(hits);
        }
        _ => bail!("Sign in to see a dashboard: timber login --simulate <role>"),
    }
    Ok(())
}

async fn cmd_messages(market: &Marketplace, json: bool) -> Result<()> {
    let conversations = market.conversations().await?;
    if json {
        return print_json(&conversations);
    }
    if conversations.is_empty() {
        if market.is_connected() {
            println!("No conversations yet.");
        } else {
            println!("No conversations. Messaging needs a live backend.");
        }
        return Ok(());
    }

    for convo in &conversations {
        println!(
            "--- {} · {} ↔ {} ---",
            convo.listing_title,
            convo.participants.hunter_name,
            convo.participants.landowner_name
        );
        for message in &convo.messages {
            println!(
                "[{}] {}: {}",
                format_timestamp(message.timestamp),
                message.sender_id,
                message.text
            );
        }
    }
    Ok(())
}
