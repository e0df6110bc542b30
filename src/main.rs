use std::{
    error::Error,
    fs::{File, create_dir_all},
    io::Write,
    sync::Arc,
    time::Duration,
};

use async_graphql::{
    EmptySubscription, SDLExportOptions, Schema, extensions::Logger, http::GraphiQLSource,
};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Router,
    extract::State,
    http::{Method, header::CONTENT_TYPE},
    response::{self, IntoResponse},
    routing::get,
};
use clap::Parser;
use log::{info, warn};
use mongodb::{Client, Database, options::ClientOptions};
use simple_logger::SimpleLogger;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};

mod aggregation;
use aggregation::{AggregationPolicy, ReviewService};

mod error;
mod event;
mod graphql;
use graphql::{mutation::Mutation, query::Query};

mod rating;
mod rest;
mod store;
use store::mongo::{MongoProductStore, MongoReviewStore};

type ReviewSchema = Schema<Query, Mutation, EmptySubscription>;

/// Command line arguments, each of them can also be set through the environment.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Generates GraphQL schema in `./schemas/review.graphql`.
    #[arg(long)]
    generate_schema: bool,
    /// MongoDB connection string.
    #[arg(long, env = "MONGODB_URI")]
    mongodb_uri: Option<String>,
    /// MongoDB database holding the `reviews` and `products` collections.
    #[arg(long, env = "MONGODB_DATABASE", default_value = "review-database")]
    database: String,
    /// Port to serve GraphQL, REST and Dapr endpoints on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// Which reviews count towards the rating of a product.
    #[arg(
        long,
        env = "RATING_POLICY",
        value_enum,
        default_value_t = AggregationPolicy::CountOnApprove
    )]
    rating_policy: AggregationPolicy,
    /// Attempts to write a product rating before giving up on concurrent modifications.
    #[arg(long, env = "MAX_AGGREGATE_ATTEMPTS", default_value_t = 16)]
    max_aggregate_attempts: u32,
}

/// Builds the GraphiQL frontend.
async fn graphiql() -> impl IntoResponse {
    response::Html(GraphiQLSource::build().endpoint("/").finish())
}

/// Establishes database connection and returns the client.
///
/// * `uri` - MongoDB connection string.
async fn db_connection(uri: &str) -> Result<Client, mongodb::error::Error> {
    // Parse a connection string into an options struct.
    let mut client_options = ClientOptions::parse(uri).await?;

    // Manually set an option.
    client_options.app_name = Some("Review Rating".to_string());

    // Get a handle to the deployment.
    Client::with_options(client_options)
}

/// Activates logger and parses arguments for optional schema generation.
/// Otherwise starts the service.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    SimpleLogger::new().init()?;

    let args = Args::parse();
    if args.generate_schema {
        let schema = Schema::build(Query, Mutation, EmptySubscription)
            .enable_federation()
            .finish();
        create_dir_all("./schemas")?;
        let mut file = File::create("./schemas/review.graphql")?;
        let sdl_export_options = SDLExportOptions::new().federation();
        let schema_sdl = schema.sdl_with_options(sdl_export_options);
        file.write_all(schema_sdl.as_bytes())?;
        info!("GraphQL schema: ./schemas/review.graphql was successfully generated!");
    } else {
        start_service(args).await?;
    }
    Ok(())
}

/// Describes the handler for GraphQL requests.
async fn graphql_handler(
    State(schema): State<ReviewSchema>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

/// Connects the stores and wires up the review service with the configured rating policy.
async fn build_service(args: &Args, db_client: &Database) -> Result<ReviewService, Box<dyn Error>> {
    let review_store = MongoReviewStore::new(db_client).await?;
    let product_store = MongoProductStore::new(db_client);
    info!("Counting reviews with policy {:?}.", args.rating_policy);
    Ok(ReviewService::new(
        Arc::new(review_store),
        Arc::new(product_store),
        args.rating_policy,
        args.max_aggregate_attempts,
    ))
}

/// Starts review rating service on the configured port.
async fn start_service(args: Args) -> Result<(), Box<dyn Error>> {
    let uri = args
        .mongodb_uri
        .as_deref()
        .ok_or("$MONGODB_URI is not set.")?;
    let client = db_connection(uri).await?;
    let db_client: Database = client.database(&args.database);
    let service = build_service(&args, &db_client).await?;

    let schema = Schema::build(Query, Mutation, EmptySubscription)
        .extension(Logger)
        .data(service.clone())
        .enable_federation()
        .finish();

    let graphiql = Router::new()
        .route("/", get(graphiql).post(graphql_handler))
        .with_state(schema);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .merge(graphiql)
        .merge(rest::router(service.clone()))
        .merge(event::http_event_service::router(service))
        .layer(cors);

    let address = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&address).await?;
    info!("GraphiQL IDE: http://{}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Review rating service shut down.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(signal_error) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", signal_error);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate_signal) => {
                terminate_signal.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(signal_error) => {
                warn!("Failed to listen for SIGTERM: {}", signal_error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
