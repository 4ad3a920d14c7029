use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pow_ledger::config::Config;
use pow_ledger::node::Node;
use pow_ledger::{api, blockchain, network};

// Create the node and register the peers given at startup
fn initialize_node(config: &Config) -> anyhow::Result<Node> {
    let node = Node::from_config(config).context("failed to build peer HTTP client")?;

    info!("Node identifier: {}", node.identifier());
    info!("Mining difficulty: {}", node.ledger().pow().difficulty());

    for address in &config.peers {
        if let Err(err) = node.peers().register_peer(address) {
            warn!("Ignoring startup peer {:?}: {}", address, err);
        }
    }

    Ok(node)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::index,
        api::handlers::new_transaction,
        api::handlers::get_pending_transactions,
        api::handlers::mine,
        api::handlers::full_chain,
        api::handlers::validate_chain,
        api::handlers::register_nodes,
        api::handlers::list_nodes,
        api::handlers::consensus
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            network::ChainResponse,
            api::handlers::TransactionRequest,
            api::handlers::TransactionResponse,
            api::handlers::MineResponse,
            api::handlers::ValidationResponse,
            api::handlers::RegisterNodesRequest,
            api::handlers::RegisterNodesResponse,
            api::handlers::NodesResponse,
            api::handlers::ResolveResponse
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work ledger node endpoints")
    ),
    info(
        title = "Ledger Node API",
        version = "0.1.0",
        description = "A minimal proof-of-work ledger with longest-valid-chain consensus",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::parse();
    config.validate()?;

    let node = web::Data::new(initialize_node(&config)?);

    info!("Starting HTTP server at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(node.clone())
            .configure(api::configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi())
            )
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?
    .run()
    .await?;

    Ok(())
}
