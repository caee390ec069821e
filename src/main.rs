use anyhow::Context;
use chrono::{Local, TimeZone};
use clap::{Args, Parser, Subcommand};
use clients_radar::config::{AppConfig, ConfigLoader, StorageConfig, UiConfig};
use clients_radar::output::console::{LOADING_SUBTITLE, LOADING_TITLE, loading_message};
use clients_radar::output::{
    Clipboard, CopyTracker, SystemClipboard, export_results, format_countdown, render_results,
};
use clients_radar::{
    Clock, Controller, Limits, Phase, RateLimitStore, SearchCriteria, SystemClock, WebhookClient,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use validator::Validate;

#[derive(Parser)]
#[command(name = "clients-radar")]
#[command(version = "0.1.0")]
#[command(about = "Find low-competition lead websites through the search webhook", long_about = None)]
struct Cli {
    /// Path to the configuration file (JSON/YAML/TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// State file; `.db`/`.sqlite` selects SQLite, anything else JSON
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Override the webhook endpoint
    #[arg(long, global = true, env = "CLIENTS_RADAR_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search; fields not given on the command line are prompted for
    Search {
        #[command(flatten)]
        form: FormArgs,

        /// Also write the results to a .json or .csv file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Show the persisted rate-limit state
    Status,
    /// Validate the configuration file given with --config
    Check,
}

#[derive(Args, Default, Clone)]
struct FormArgs {
    #[arg(long)]
    niche: Option<String>,
    #[arg(long)]
    max_traffic: Option<u64>,
    #[arg(long)]
    max_da: Option<u32>,
    #[arg(long)]
    max_dr: Option<u32>,
    #[arg(long)]
    min_spam_score: Option<u32>,
    #[arg(long)]
    keywords: Option<String>,
    #[arg(long)]
    amount: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    let cli = Cli::parse();
    let multi = MultiProgress::new();

    if cli.quiet {
        let logger = env_logger::Builder::new()
            .filter_level(log::LevelFilter::Warn)
            .build();
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(log::LevelFilter::Warn);
    } else {
        let logger = env_logger::Builder::from_default_env().build();
        let level = logger.filter();
        indicatif_log_bridge::LogWrapper::new(multi.clone(), logger).try_init()?;
        log::set_max_level(level);
    }

    match cli.command {
        Commands::Check => check(cli.config),
        Commands::Search { form, export } => {
            let config = effective_config(&cli.config, cli.webhook_url, &cli.state)?;
            search(config, form, export, multi).await
        }
        Commands::Status => {
            let config = effective_config(&cli.config, cli.webhook_url, &cli.state)?;
            status(config).await
        }
    }
}

fn effective_config(
    path: &Option<PathBuf>,
    webhook_url: Option<String>,
    state: &Option<PathBuf>,
) -> anyhow::Result<AppConfig> {
    let config = ConfigLoader::load_or_default(path.as_deref())?;
    let config = ConfigLoader::apply_overrides(config, webhook_url, state.as_deref())?;
    Ok(config)
}

fn check(path: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(path) = path else {
        anyhow::bail!("check needs a configuration file, pass it with --config");
    };
    match ConfigLoader::load(&path) {
        Ok(cfg) => {
            println!("✅ Config is valid:");
            println!("   Webhook: {}", cfg.webhook.url);
            println!("   Timeout: {}ms", cfg.webhook.timeout_ms);
            println!("   Rate-limit cooldown: {}s", cfg.webhook.rate_limit_cooldown_secs);
            println!("   Min request interval: {}ms", cfg.limits.min_request_interval_ms);
            println!("   Storage: {}", describe_storage(&cfg.storage));
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Config error: {}", e);
            std::process::exit(1);
        }
    }
}

fn describe_storage(storage: &StorageConfig) -> String {
    match storage {
        StorageConfig::Memory => "memory (not persisted)".to_string(),
        StorageConfig::Json { path } => format!("json file {}", path),
        StorageConfig::Sqlite { path } => format!("sqlite {}", path),
    }
}

async fn build_controller(config: &AppConfig) -> anyhow::Result<Controller> {
    let backend = ConfigLoader::open_store(&config.storage)
        .await
        .with_context(|| format!("opening {}", describe_storage(&config.storage)))?;
    let client = WebhookClient::new(&config.webhook)?;
    log::debug!("Webhook endpoint: {}", client.endpoint());

    let mut controller = Controller::new(
        Arc::new(client),
        RateLimitStore::new(backend),
        Arc::new(SystemClock),
        Limits::from_config(config),
    );
    controller.start().await?;
    Ok(controller)
}

async fn status(config: AppConfig) -> anyhow::Result<()> {
    let controller = build_controller(&config).await?;
    let status = controller.status();

    println!("Storage: {}", describe_storage(&config.storage));
    println!(
        "Confirmed rate-limit notice: {}",
        if status.state.has_ever_requested { "yes" } else { "no" }
    );
    match status.state.last_request_at_ms {
        0 => println!("Last request: never"),
        ms => println!("Last request: {}", format_timestamp(ms)),
    }
    match status.next_request_in_ms {
        Some(ms) => println!("Next request allowed in: {}", format_countdown(ms.div_ceil(1000))),
        None => println!("Next request allowed: now"),
    }
    if status.cooldown_remaining_secs > 0 {
        println!(
            "Rate-limit cooldown: {} remaining",
            format_countdown(status.cooldown_remaining_secs)
        );
    } else {
        println!("Rate-limit cooldown: none");
    }
    Ok(())
}

fn format_timestamp(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}

async fn search(
    config: AppConfig,
    mut args: FormArgs,
    export: Option<PathBuf>,
    multi: MultiProgress,
) -> anyhow::Result<()> {
    let mut controller = build_controller(&config).await?;
    let view = spawn_phase_view(controller.watch_phase(), multi, config.ui.clone());
    let mut prompt = Prompt::new();
    let clipboard = SystemClipboard;
    let clock = SystemClock;
    let mut copied = CopyTracker::new(config.ui.copied_indicator_ms);

    loop {
        match controller.phase() {
            Phase::Form { initial } => {
                let Some(criteria) = prompt.form(&args, initial.as_ref()).await? else {
                    break;
                };
                args = FormArgs::default();
                controller.submit(criteria).await?;
            }
            Phase::Confirm { .. } => {
                print_rate_limit_notice(&config);
                let answer = prompt.ask("Proceed with search? [y/N]: ").await?;
                match answer.as_deref().map(str::trim) {
                    Some("y") | Some("Y") | Some("yes") => controller.confirm().await?,
                    Some(_) => controller.cancel()?,
                    None => break,
                }
            }
            Phase::Loading { .. } => {
                // search() only returns after leaving this phase
                tokio::task::yield_now().await;
            }
            Phase::Results { records } => {
                if let Some(path) = &export {
                    match export_results(path, &records).await {
                        Ok(n) => println!("Exported {} results to {}", n, path.display()),
                        Err(e) => eprintln!("Export failed: {}", e),
                    }
                }
                loop {
                    let now = clock.now_ms();
                    copied.prune(now);
                    println!("\n{}", render_results(&records, &copied, now));
                    let answer = prompt
                        .ask("Row number to copy its URL, 'n' for a new search, 'q' to quit: ")
                        .await?;
                    let Some(answer) = answer else {
                        return finish(view);
                    };
                    match answer.trim() {
                        "q" => return finish(view),
                        "n" => {
                            controller.new_search()?;
                            break;
                        }
                        other => match other.parse::<usize>() {
                            Ok(row) if row >= 1 && row <= records.len() => {
                                let url = records[row - 1].url();
                                match clipboard.copy(&url) {
                                    Ok(()) => copied.mark_copied(&url, clock.now_ms()),
                                    Err(e) => log::error!("Failed to copy URL: {}", e),
                                }
                            }
                            _ => println!("Unknown choice {:?}", other),
                        },
                    }
                }
            }
            Phase::Error { error } => {
                println!("\nSearch Error");
                println!("{}", error);
                match prompt.ask("Press Enter to try again, 'q' to quit: ").await? {
                    Some(answer) if answer.trim() == "q" => break,
                    Some(_) => controller.try_again()?,
                    None => break,
                }
            }
            Phase::RateLimited { .. } => {
                println!("\nThe API rate limit has been exceeded.");
                println!("This cooldown persists across restarts to prevent further rate limiting.");
                tokio::select! {
                    res = controller.run_cooldown() => res?,
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Shutting down...");
                        break;
                    }
                }
            }
        }
    }

    finish(view)
}

fn finish(view: JoinHandle<()>) -> anyhow::Result<()> {
    view.abort();
    Ok(())
}

fn print_rate_limit_notice(config: &AppConfig) {
    let interval_mins = config.limits.min_request_interval_ms / 60_000;
    let cooldown_hours = config.webhook.rate_limit_cooldown_secs / 3600;
    println!("\nImportant: Rate Limiting Notice");
    println!("  This API has very strict rate limits");
    println!("  • Only 1 request per {} minutes is allowed", interval_mins);
    println!("  • Exceeding limits triggers a {}-hour cooldown", cooldown_hours);
    println!("  • Make sure your search parameters are exactly what you need");
    println!("  • Double-check your niche, traffic limits, and other settings");
}

/// Spinner while loading, countdown while rate limited.
fn spawn_phase_view(
    mut phase_rx: watch::Receiver<Phase>,
    multi: MultiProgress,
    ui: UiConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut active: Option<(&'static str, ProgressBar)> = None;
        let mut rotate = tokio::time::interval(Duration::from_millis(ui.loading_message_interval_ms));
        let mut step = 0usize;
        // render whatever phase start() restored
        phase_rx.mark_changed();

        loop {
            tokio::select! {
                changed = phase_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let phase = phase_rx.borrow_and_update().clone();
                    if active.as_ref().is_some_and(|(kind, _)| *kind != phase.name()) {
                        if let Some((_, bar)) = active.take() {
                            bar.finish_and_clear();
                        }
                    }
                    match phase {
                        Phase::Loading { .. } => {
                            if active.is_none() {
                                step = 0;
                                rotate.reset();
                                let bar = multi.add(ProgressBar::new_spinner());
                                bar.set_style(spinner_style(&format!("{} {}", LOADING_TITLE, LOADING_SUBTITLE)));
                                bar.enable_steady_tick(Duration::from_millis(120));
                                bar.set_message(loading_message(step));
                                active = Some(("loading", bar));
                            }
                        }
                        Phase::RateLimited { remaining_secs } => {
                            let (_, bar) = active.get_or_insert_with(|| {
                                let bar = multi.add(ProgressBar::new_spinner());
                                bar.set_style(spinner_style("Rate limit active"));
                                ("rate-limited", bar)
                            });
                            bar.set_message(format!(
                                "{} until the next search is allowed",
                                format_countdown(remaining_secs)
                            ));
                            bar.tick();
                        }
                        _ => {}
                    }
                }
                _ = rotate.tick() => {
                    if let Some(("loading", bar)) = &active {
                        step += 1;
                        bar.set_message(loading_message(step));
                    }
                }
            }
        }

        if let Some((_, bar)) = active {
            bar.finish_and_clear();
        }
    })
}

fn spinner_style(title: &str) -> ProgressStyle {
    let template = format!("{{spinner:.green}} {} {{msg}}", title.replace('{', "{{").replace('}', "}}"));
    ProgressStyle::default_spinner()
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Line-oriented prompts on stdin.
struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Returns `None` once stdin is closed.
    async fn ask(&mut self, question: &str) -> anyhow::Result<Option<String>> {
        print!("{}", question);
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }

    async fn field<T>(&mut self, label: &str, given: Option<T>, default: Option<T>) -> anyhow::Result<Option<T>>
    where
        T: FromStr + Display,
        T::Err: Display,
    {
        if let Some(value) = given {
            return Ok(Some(value));
        }
        loop {
            let question = match &default {
                Some(d) => format!("{} [{}]: ", label, d),
                None => format!("{}: ", label),
            };
            let Some(line) = self.ask(&question).await? else {
                return Ok(None);
            };
            let line = line.trim();
            if line.is_empty() {
                if default.is_some() {
                    return Ok(default);
                }
                continue;
            }
            match line.parse::<T>() {
                Ok(value) => return Ok(Some(value)),
                Err(e) => println!("  invalid {}: {}", label.to_lowercase(), e),
            }
        }
    }

    /// Collects criteria, re-asking until they validate.
    async fn form(
        &mut self,
        args: &FormArgs,
        initial: Option<&SearchCriteria>,
    ) -> anyhow::Result<Option<SearchCriteria>> {
        let mut given = args.clone();
        loop {
            let Some(niche) = self.field("Niche", given.niche.take(), initial.map(|c| c.niche.clone())).await? else {
                return Ok(None);
            };
            let Some(max_traffic) = self.field("Max traffic", given.max_traffic.take(), initial.map(|c| c.max_traffic)).await? else {
                return Ok(None);
            };
            let Some(max_da) = self.field("Max DA", given.max_da.take(), initial.map(|c| c.max_da)).await? else {
                return Ok(None);
            };
            let Some(max_dr) = self.field("Max DR", given.max_dr.take(), initial.map(|c| c.max_dr)).await? else {
                return Ok(None);
            };
            let Some(min_spam_score) = self.field("Min spam score", given.min_spam_score.take(), initial.map(|c| c.min_spam_score)).await? else {
                return Ok(None);
            };
            let keywords = match given.keywords.take() {
                Some(keywords) => keywords,
                None => {
                    let default = initial.map(|c| c.keywords.clone()).unwrap_or_default();
                    let Some(line) = self.ask(&format!("Keywords [{}]: ", default)).await? else {
                        return Ok(None);
                    };
                    if line.trim().is_empty() { default } else { line.trim().to_string() }
                }
            };
            let Some(amount) = self.field("Amount", given.amount.take(), initial.map(|c| c.amount)).await? else {
                return Ok(None);
            };

            let criteria = SearchCriteria {
                niche,
                max_traffic,
                max_da,
                max_dr,
                min_spam_score,
                keywords,
                amount,
            };
            match criteria.validate() {
                Ok(()) => return Ok(Some(criteria)),
                Err(e) => println!("Please fix the search settings: {}", e),
            }
        }
    }
}
