use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use verity_core::moderation::Verdict;
use verity_core::Role;

/// Verity: command line client for the Verity API
#[derive(Parser, Debug)]
#[command(name = "verity")]
#[command(about = "Command line client for the Verity API", long_about = None)]
struct Cli {
    /// Base URL of the Verity server
    #[arg(long, env = "VERITY_SERVER", default_value = "http://localhost:5000")]
    server: String,

    /// Session token from `verity login`
    #[arg(long, env = "VERITY_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account
    Signup(SignupArgs),
    /// Log in and print a session token
    Login(LoginArgs),
    /// Show approved posts
    Feed(FeedArgs),
    /// Summarize the review queue (Reviewer only)
    Pending,
    /// Record a verdict on a pending post (Reviewer only)
    Review(ReviewArgs),
    /// Show your reviewer statistics
    Stats,
    /// List the reviews you have written
    History,
    /// Browse the marketplace
    Products(ProductsArgs),
}

#[derive(Parser, Debug)]
struct SignupArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    email: String,

    #[arg(long)]
    password: String,

    /// User, Reviewer or Business
    #[arg(long, default_value = "User")]
    role: Role,
}

#[derive(Parser, Debug)]
struct LoginArgs {
    #[arg(long)]
    email: String,

    #[arg(long)]
    password: String,

    /// Reject the login unless the account has this role
    #[arg(long)]
    role: Option<Role>,
}

#[derive(Parser, Debug)]
struct FeedArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long)]
    limit: Option<u32>,
}

#[derive(Parser, Debug)]
struct ReviewArgs {
    /// Id of the pending post
    post_id: String,

    /// verified, misleading, false or needs-context
    #[arg(long)]
    verdict: Verdict,

    /// How sure you are, 0 to 100
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    confidence: u32,

    #[arg(long)]
    notes: Option<String>,

    #[arg(long = "tag")]
    tags: Vec<String>,
}

#[derive(Parser, Debug)]
struct ProductsArgs {
    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long, default_value_t = 1)]
    page: u32,
}

struct Api<'a> {
    client: &'a reqwest::Client,
    server: String,
    token: Option<String>,
}

impl Api<'_> {
    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.server.trim_end_matches('/'), path)
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .context("A session token must be provided via --token or VERITY_TOKEN; run `verity login` first")
    }

    async fn get(&self, path: &str, query: &[(&str, String)], authed: bool) -> Result<Value> {
        let mut request = self.client.get(self.url(path)).query(query);
        if authed {
            request = request.header("Authorization", format!("Bearer {}", self.token()?));
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;
        read_response(response).await
    }

    async fn post(&self, path: &str, body: &Value, authed: bool) -> Result<Value> {
        let mut request = self.client.post(self.url(path)).json(body);
        if authed {
            request = request.header("Authorization", format!("Bearer {}", self.token()?));
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;
        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .context("Failed to parse server response")?;
    if !status.is_success() {
        let message = body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(anyhow!("Server error: {} - {}", status, message));
    }
    Ok(body)
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

async fn run_signup(api: &Api<'_>, args: SignupArgs) -> Result<()> {
    let body = json!({
        "fullName": args.name,
        "email": args.email,
        "password": args.password,
        "role": args.role.as_str(),
    });
    let response = api.post("/auth/signup", &body, false).await?;
    eprintln!("{}", text(&response, "message"));
    println!("{}", text(&response, "token"));
    Ok(())
}

async fn run_login(api: &Api<'_>, args: LoginArgs) -> Result<()> {
    let mut body = json!({ "email": args.email, "password": args.password });
    if let Some(role) = args.role {
        body["role"] = json!(role.as_str());
    }
    let response = api.post("/auth/login", &body, false).await?;
    println!("{}", text(&response, "token"));
    Ok(())
}

async fn run_feed(api: &Api<'_>, args: FeedArgs) -> Result<()> {
    let mut query = vec![("page", args.page.to_string())];
    if let Some(limit) = args.limit {
        query.push(("limit", limit.to_string()));
    }
    let response = api.get("/posts/feed", &query, false).await?;

    for post in response["posts"].as_array().into_iter().flatten() {
        let author = post["author"]["fullName"].as_str().unwrap_or("(deleted)");
        println!("{}  {}", text(post, "id"), author);
        println!("    {}", text(post, "content"));
    }
    eprintln!(
        "Page {} of {} ({} posts)",
        response["currentPage"], response["totalPages"], response["totalPosts"]
    );
    Ok(())
}

async fn run_pending(api: &Api<'_>) -> Result<()> {
    let response = api.get("/reviews/pending", &[], true).await?;
    for group in response["groupedPosts"].as_array().into_iter().flatten() {
        let author = group["author"]["fullName"].as_str().unwrap_or("(unknown)");
        println!("{} ({} pending)", author, group["totalPosts"]);
        for post in group["posts"].as_array().into_iter().flatten() {
            println!("    {}  {}", text(post, "id"), text(post, "content"));
        }
    }
    eprintln!(
        "{} posts from {} authors",
        response["totalPosts"], response["totalAuthors"]
    );
    Ok(())
}

async fn run_review(api: &Api<'_>, args: ReviewArgs) -> Result<()> {
    let body = json!({
        "postId": args.post_id,
        "verdict": args.verdict.as_str(),
        "confidence": args.confidence,
        "notes": args.notes,
        "tags": args.tags,
    });
    let response = api.post("/reviews/submit", &body, true).await?;
    println!("{}", text(&response, "message"));
    Ok(())
}

async fn run_stats(api: &Api<'_>) -> Result<()> {
    let response = api.get("/reviews/stats", &[], true).await?;
    let stats = &response["stats"];
    println!("Total reviews:    {}", stats["totalReviews"]);
    println!("Approved:         {}", stats["approvedReviews"]);
    println!("Rejected:         {}", stats["rejectedReviews"]);
    println!("Awaiting review:  {}", stats["pendingReviews"]);
    println!("Accuracy:         {}%", stats["accuracy"]);
    Ok(())
}

async fn run_history(api: &Api<'_>) -> Result<()> {
    let response = api.get("/reviews/history", &[], true).await?;
    for review in response["reviews"].as_array().into_iter().flatten() {
        let content = review["post"]["content"].as_str().unwrap_or("(post deleted)");
        println!(
            "{}  {:<14} {:>3}%  {}",
            text(review, "createdAt"),
            text(review, "verdict"),
            review["confidence"],
            content
        );
    }
    Ok(())
}

async fn run_products(api: &Api<'_>, args: ProductsArgs) -> Result<()> {
    let mut query = vec![("page", args.page.to_string())];
    if let Some(category) = args.category {
        query.push(("category", category));
    }
    if let Some(search) = args.search {
        query.push(("search", search));
    }
    let response = api.get("/products", &query, false).await?;

    for product in response["products"].as_array().into_iter().flatten() {
        println!(
            "{}  {:>10} {}  {} [{}]",
            text(product, "id"),
            product["price"],
            text(product, "currency"),
            text(product, "name"),
            text(product, "category")
        );
    }
    eprintln!(
        "Page {} of {} ({} products)",
        response["currentPage"], response["totalPages"], response["totalProducts"]
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")?;
    let api = Api {
        client: &client,
        server: cli.server,
        token: cli.token,
    };

    match cli.command {
        Commands::Signup(args) => run_signup(&api, args).await,
        Commands::Login(args) => run_login(&api, args).await,
        Commands::Feed(args) => run_feed(&api, args).await,
        Commands::Pending => run_pending(&api).await,
        Commands::Review(args) => run_review(&api, args).await,
        Commands::Stats => run_stats(&api).await,
        Commands::History => run_history(&api).await,
        Commands::Products(args) => run_products(&api, args).await,
    }
}
