//! tweetcast-post - Upload a video or image and publish it as a post

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use libtweetcast::logging::LoggingConfig;
use libtweetcast::{
    Config, Credentials, MediaSource, PublishedPost, Result, TweetcastError, UploadRequest,
    Uploader,
};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "tweetcast-post")]
#[command(version)]
#[command(about = "Upload a video or image and publish it as a post", long_about = None)]
struct Cli {
    /// Remote media to download and post
    #[arg(short, long, value_name = "URL")]
    url: Option<String>,

    /// Local media file to post
    #[arg(short = 'F', long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Post text (may be omitted for a media-only post)
    #[arg(short, long, default_value = "")]
    text: String,

    /// Post id to reply to
    #[arg(short, long, value_name = "POST_ID")]
    reply_to: Option<String>,

    /// MIME type of --file, overriding its extension
    #[arg(short, long)]
    mime: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = TweetcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(TweetcastError::InvalidInput(format!(
                "Invalid format '{}'. Valid options: text, json",
                other
            ))),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env().with_verbose(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.parse()?;
    let request = build_request(&cli)?;

    let config = Config::load()?;
    let credentials = Credentials::from_env()?;
    debug!(
        "Uploading to {} and posting to {}",
        config.api.upload_url, config.api.tweet_url
    );

    let uploader = Uploader::new(config, credentials)?;
    let post = uploader.upload_and_post(request).await?;

    println!("{}", render(&post, format));
    Ok(())
}

fn build_request(cli: &Cli) -> Result<UploadRequest> {
    if cli.mime.is_some() && cli.file.is_none() {
        return Err(TweetcastError::InvalidInput(
            "--mime only applies to --file".to_string(),
        ));
    }

    let file = cli.file.clone().map(|path| MediaSource::File {
        path,
        mime: cli.mime.clone(),
    });
    let source = MediaSource::select(cli.url.clone(), file)?;

    Ok(UploadRequest::new(source)
        .with_text(cli.text.clone())
        .reply_to(cli.reply_to.clone().filter(|id| !id.trim().is_empty())))
}

fn render(post: &PublishedPost, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => post.post_id.clone(),
        OutputFormat::Json => serde_json::json!({
            "success": true,
            "tweet_id": post.post_id,
            "media_id": post.media_id,
        })
        .to_string(),
    }
}
