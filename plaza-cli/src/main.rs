use clap::{Parser, Subcommand};
use plaza_common::{FeedView, FilterPatch, MediaType, Post, SortBy};
use plaza_core::{
    ApiClient, Config, FeedController, FeedKind, PlayerSettings, PostsApi, SessionStore,
    StoriesBar, StoryPlayer, StoryProgress,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// plaza: browse the Plaza feed and stories from a terminal.
#[derive(Parser)]
#[command(name = "plaza")]
struct Args {
    /// Base URL of the Plaza API.
    #[arg(long, env = "PLAZA_API_URL")]
    api_url: Option<String>,

    /// Session file holding the access token.
    #[arg(long, env = "PLAZA_SESSION_PATH")]
    session_path: Option<PathBuf>,

    /// Posts per page.
    #[arg(long, env = "PLAZA_PAGE_SIZE")]
    page_size: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Page through a feed and print its posts.
    Feed {
        /// Posts from followed users instead of everyone.
        #[arg(long)]
        following: bool,

        /// all, image, video or text.
        #[arg(long)]
        media_type: Option<MediaType>,

        /// created_at, likes_count or comments_count.
        #[arg(long)]
        sort_by: Option<SortBy>,

        /// How many pages to load.
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Print post counts by media type.
    Stats,
    /// Autoplay the active stories until the last one ends.
    Stories {
        /// Author whose stories play first.
        #[arg(long)]
        author: Option<String>,
    },
}

/// Library spans stay at info; everything else only reports warnings
const DEFAULT_LOG_FILTER: &str = "warn,plaza=info,plaza_core=info";

fn log_filter(directives: Option<&str>) -> tracing_subscriber::EnvFilter {
    directives
        .and_then(|d| tracing_subscriber::EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Logs go to stderr so printed posts and stories can be piped.
fn configure_logging() {
    use tracing_subscriber::prelude::*;

    let directives = std::env::var("RUST_LOG").ok();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .with_file(true);

    tracing_subscriber::registry()
        .with(log_filter(directives.as_deref()))
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() {
    configure_logging();
    let args = Args::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load config: {e}");
        std::process::exit(1);
    });
    if let Some(url) = args.api_url {
        config.api_base_url = url;
    }
    if let Some(path) = args.session_path {
        config.session_path = path;
    }
    if let Some(page_size) = args.page_size.filter(|n| *n > 0) {
        config.page_size = page_size;
    }

    info!("plaza starting against {}", config.api_base_url);

    let session = SessionStore::open(&config.session_path);
    if !session.session().is_authenticated() {
        warn!("No access token in {}; requests are anonymous", config.session_path.display());
    }

    let client = ApiClient::new(&config.api_base_url, session.clone()).unwrap_or_else(|e| {
        error!("Invalid API URL: {e}");
        std::process::exit(1);
    });
    let client = Arc::new(client);

    match args.command {
        Command::Feed {
            following,
            media_type,
            sort_by,
            pages,
        } => {
            let kind = if following {
                FeedKind::Following
            } else {
                FeedKind::Explore
            };
            let patch = FilterPatch {
                media_type,
                sort_by,
            };
            run_feed(client, &config, kind, patch, pages).await;
        }
        Command::Stats => run_stats(client).await,
        Command::Stories { author } => run_stories(client, &config, &session, author).await,
    }
}

async fn run_feed(
    client: Arc<ApiClient>,
    config: &Config,
    kind: FeedKind,
    patch: FilterPatch,
    pages: u32,
) {
    let feed = FeedController::new(kind, client, config.page_size);
    if patch == FilterPatch::default() {
        feed.mount().await;
    } else {
        tokio::join!(feed.update_filters(patch), feed.load_stats());
    }

    for _ in 1..pages {
        if !feed.has_more() || feed.snapshot().error.is_some() {
            break;
        }
        feed.load_more().await;
    }

    let state = feed.snapshot();
    for post in &state.items {
        print_post(post);
    }

    match feed.view() {
        FeedView::Error(message) => {
            error!("Failed to load feed: {message}");
            std::process::exit(1);
        }
        FeedView::Empty => println!("No posts yet."),
        FeedView::EndOfContent => println!("-- end of feed ({} posts) --", state.items.len()),
        FeedView::Items => println!("-- {} posts, more available --", state.items.len()),
        FeedView::Skeleton => {}
    }
    if let Some(stats) = state.stats {
        println!(
            "{} posts total: {} image, {} video, {} text",
            stats.total_posts, stats.image_posts, stats.video_posts, stats.text_posts
        );
    }
}

fn print_post(post: &Post) {
    let content = post.content().unwrap_or_default();
    let first_line = content.lines().next().unwrap_or_default();
    println!(
        "{:<26} @{:<16} {:>4} likes {:>4} comments  [{}] {}",
        post.id,
        post.author_username().unwrap_or("?"),
        post.likes_count,
        post.comments_count(),
        post.media_type().unwrap_or("text"),
        first_line
    );
}

async fn run_stats(client: Arc<ApiClient>) {
    match client.post_stats().await {
        Ok(stats) => {
            println!("total  {}", stats.total_posts);
            println!("image  {}", stats.image_posts);
            println!("video  {}", stats.video_posts);
            println!("text   {}", stats.text_posts);
        }
        Err(e) => {
            error!("Failed to load stats: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_stories(
    client: Arc<ApiClient>,
    config: &Config,
    session: &SessionStore,
    author: Option<String>,
) {
    let mut bar = StoriesBar::new(client.clone());
    bar.load().await;

    let Some(start) = author.or_else(|| bar.roster().first().map(|c| c.author_id.clone())) else {
        println!("No active stories.");
        return;
    };

    let viewer_id = session.viewer_id();
    let (handle, mut progress) = StoryPlayer::start(
        bar.roster().to_vec(),
        &start,
        viewer_id,
        client,
        PlayerSettings::from(config),
    )
    .unwrap_or_else(|e| {
        error!("Cannot play stories: {e}");
        std::process::exit(1);
    });

    println!("== {start} ==");
    loop {
        tokio::select! {
            event = progress.recv() => {
                let Some(event) = event else { break };
                match event {
                    StoryProgress::CollectionChanged { author_id, .. } => {
                        println!("== {author_id} ==");
                    }
                    StoryProgress::StoryChanged { story_id, index, .. } => {
                        println!("  [{}] {}", index + 1, story_id);
                    }
                    StoryProgress::StoryDeleted { author_id, story_id } => {
                        bar.remove_story(&author_id, &story_id);
                    }
                    StoryProgress::Closed => break,
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing stories");
                handle.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_defaults() {
        assert_eq!(log_filter(None).to_string(), log_filter(Some(DEFAULT_LOG_FILTER)).to_string());
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
    }

    #[test]
    fn test_feed_args() {
        let args = Args::try_parse_from([
            "plaza", "--page-size", "5", "feed", "--media-type", "video", "--pages", "3",
        ])
        .unwrap();
        assert_eq!(args.page_size, Some(5));
        match args.command {
            Command::Feed {
                following,
                media_type,
                sort_by,
                pages,
            } => {
                assert!(!following);
                assert_eq!(media_type, Some(MediaType::Video));
                assert_eq!(sort_by, None);
                assert_eq!(pages, 3);
            }
            _ => panic!("expected feed"),
        }
    }
}
