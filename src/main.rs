use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wpeople_core::config::Config;
use wpeople_core::error::{Result, WPeopleError};
use wpeople_core::types::{Address, Birthday, NewContact};
use wpeople_integrations::context::Context;
use wpeople_integrations::settings::SettingsForm;

#[derive(Parser)]
#[command(name = "wpeople", about = "Google Contacts integration: OAuth setup and contact management")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "WPEOPLE_CONFIG", default_value = "wpeople.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save client id/secret (and the inbound API token) and write the client secret file.
    Configure {
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        client_secret: Option<String>,
        #[arg(long)]
        authorization_token: Option<String>,
        /// Only replace the inbound API token.
        #[arg(long)]
        token_only: bool,
    },
    /// Print the consent URL to visit.
    AuthUrl,
    /// Exchange an authorization code and store the token.
    Exchange { code: String },
    /// Show the authorization state.
    Status,
    /// Introspect the stored access token.
    TokenInfo,
    /// Refresh the stored token with its refresh token.
    Refresh,
    /// List one page of contacts.
    List,
    /// Show one contact, e.g. people/c123.
    Get { resource_name: String },
    /// Create a contact.
    Create(CreateArgs),
    /// Upload a contact photo from an image file.
    Photo {
        resource_name: String,
        file: PathBuf,
    },
    /// Find a contact group by name, creating it if missing.
    Group { name: String },
    /// Delete the stored client secret and token.
    Deauthorize,
    /// Run the OAuth callback and contacts HTTP server.
    Serve,
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    country_code: Option<String>,
    #[arg(long)]
    birthday_year: Option<i32>,
    #[arg(long)]
    birthday_month: Option<u32>,
    #[arg(long)]
    birthday_day: Option<u32>,
    /// Raw JSON for the People API `urls` field.
    #[arg(long)]
    urls_json: Option<String>,
    /// Raw JSON for the People API `events` field.
    #[arg(long)]
    events_json: Option<String>,
    /// Raw JSON for the People API `userDefined` field.
    #[arg(long)]
    user_defined_json: Option<String>,
}

impl CreateArgs {
    fn into_contact(self) -> Result<NewContact> {
        let address = (self.city.is_some() || self.country.is_some() || self.country_code.is_some())
            .then(|| Address {
                city: self.city,
                country: self.country,
                country_code: self.country_code,
            });
        let birthday = (self.birthday_year.is_some()
            || self.birthday_month.is_some()
            || self.birthday_day.is_some())
        .then_some(Birthday {
            year: self.birthday_year,
            month: self.birthday_month,
            day: self.birthday_day,
        });

        Ok(NewContact {
            name: self.name,
            phone: self.phone,
            email: self.email,
            group: self.group,
            address,
            birthday,
            urls: parse_json_arg("urls-json", self.urls_json)?,
            events: parse_json_arg("events-json", self.events_json)?,
            user_defined: parse_json_arg("user-defined-json", self.user_defined_json)?,
        })
    }
}

fn parse_json_arg(flag: &str, raw: Option<String>) -> Result<Option<serde_json::Value>> {
    raw.map(|s| {
        serde_json::from_str(&s)
            .map_err(|e| WPeopleError::Config(format!("--{flag} is not valid JSON: {e}")))
    })
    .transpose()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("fatal: failed to load config: {e}");
        std::process::exit(1);
    });
    tracing::debug!(config = %cli.config.display(), "config loaded");
    let ctx = Arc::new(Context::from_config(config));

    match run(ctx, cli.command).await {
        Ok(Some(output)) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("error: failed to render output: {e}");
                std::process::exit(1);
            }
        },
        Ok(None) => {}
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(ctx: Arc<Context>, command: Command) -> Result<Option<serde_json::Value>> {
    let output = match command {
        Command::Configure {
            client_id,
            client_secret,
            authorization_token,
            token_only,
        } => {
            let form = SettingsForm {
                client_id,
                client_secret,
                authorization_token,
                token_only,
            };
            ctx.admin().save(&form).await?;

            if token_only {
                serde_json::json!({ "saved": true })
            } else {
                let client_id = ctx.admin().client_id().await?.unwrap_or_default();
                let client_secret = ctx.admin().client_secret().await?.unwrap_or_default();
                let redirect = ctx
                    .credentials()
                    .await?
                    .store_client_credentials(&client_id, &client_secret)
                    .await?;
                serde_json::json!({
                    "saved": true,
                    "authorized_redirect_uri": ctx.config().google.redirect_url,
                    "redirect": redirect.location,
                })
            }
        }
        Command::AuthUrl => serde_json::json!({
            "auth_url": ctx.authorization_url().await?,
            "redirect_uri": ctx.config().google.redirect_url,
        }),
        Command::Exchange { code } => {
            let auth = ctx.google_auth().await?;
            let redirect = ctx
                .credentials()
                .await?
                .exchange_authorization_code(&auth, &code)
                .await?;
            serde_json::json!({ "authorized": true, "redirect": redirect.location })
        }
        Command::Status => {
            let credentials = ctx.credentials().await?;
            serde_json::json!({
                "instance": credentials.instance(),
                "state": credentials.authorization_state().await,
            })
        }
        Command::TokenInfo => render(&ctx.contacts().await?.token_info(None).await?)?,
        Command::Refresh => {
            let credentials = ctx.credentials().await?;
            let current = credentials.get_token().await?;
            let refresh_token = current
                .refresh_token
                .ok_or(WPeopleError::MissingArgument("refresh_token"))?;
            let record = ctx.google_auth().await?.refresh(&refresh_token).await?;
            credentials.store_token(&record).await?;
            serde_json::json!({ "refreshed": true })
        }
        Command::List => render(&ctx.contacts().await?.list_connections(None).await?)?,
        Command::Get { resource_name } => {
            render(&ctx.contacts().await?.get_contact(&resource_name, None).await?)?
        }
        Command::Create(args) => {
            let contact = args.into_contact()?;
            render(&ctx.contacts().await?.create_contact(&contact).await?)?
        }
        Command::Photo {
            resource_name,
            file,
        } => {
            let photo = read_photo(&file).await?;
            let person = ctx
                .contacts()
                .await?
                .update_contact_photo(&resource_name, &photo, None)
                .await?;
            render(&person)?
        }
        Command::Group { name } => {
            render(&ctx.contacts().await?.resolve_group(&name, None).await?)?
        }
        Command::Deauthorize => {
            let redirect = ctx.credentials().await?.remove_authorization().await?;
            serde_json::json!({ "removed": true, "redirect": redirect.location })
        }
        Command::Serve => {
            let port = ctx.config().server.port;
            wpeople_integrations::http::start_server(port, ctx).await?;
            return Ok(None);
        }
    };
    Ok(Some(output))
}

fn render<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| WPeopleError::Decode(format!("failed to render output: {e}")))
}

async fn read_photo(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| WPeopleError::Storage(format!("failed to read {}: {e}", path.display())))?;
    Ok(BASE64.encode(bytes))
}
