//! Cartwheel - interactive shopping-agent client.
//!
//! Plain text is sent to the agent as a search; slash commands operate
//! on the latest results, the watchlist, and purchases. State persists
//! in a local SQLite file between runs.

use std::env;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use agent_client::{AgentClient, AgentConfig, CheckoutRequest, CheckoutSession};
use cartwheel_database::Database;
use conversation::{ConversationEngine, ProfileStore, SendOutcome};
use shopper_core::{UiProduct, UserProfile};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conversation=info".parse().unwrap())
                .add_directive("agent_client=info".parse().unwrap()),
        )
        .init();

    let db_path = env::var("CARTWHEEL_DB").unwrap_or_else(|_| "cartwheel.db".to_string());
    let db = Database::connect(&format!("sqlite:{db_path}?mode=rwc")).await?;
    let store = ProfileStore::load(db.clone()).await?;
    let client = AgentClient::new(AgentConfig::from_env())?;
    let engine = ConversationEngine::new(client.clone(), store, db).await?;

    let _heartbeat = client.start_heartbeat(HEARTBEAT_INTERVAL);

    // Best effort; the backend may be down and the client still works
    // from local state.
    if let Err(e) = engine.refresh_shipping().await {
        warn!("could not refresh shipping statuses: {}", e);
    }
    match client.purchase_alerts().await {
        Ok(alerts) if !alerts.is_empty() => {
            println!("You have {} price-drop alert(s). Type /alerts to see them.", alerts.len());
        }
        Ok(_) => {}
        Err(e) => warn!("could not fetch purchase alerts: {}", e),
    }

    println!("Cartwheel shopping agent. Type /help for commands, /quit to exit.");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" || input == "/exit" {
            break;
        }
        if let Some(command) = input.strip_prefix('/') {
            run_command(&engine, &client, command).await;
        } else {
            send(&engine, input).await;
        }
    }

    println!("Bye.");
    Ok(())
}

async fn send(engine: &ConversationEngine<AgentClient>, text: &str) {
    match engine.send(text).await {
        SendOutcome::Results { count } => {
            let messages = engine.messages().await;
            if let Some(message) = messages.last() {
                if let Some(thinking) = &message.thinking {
                    println!("  [{thinking}]");
                }
                println!("agent> {}", message.text);
                if let Some(products) = &message.products {
                    print_products(products);
                }
            }
            if count == 0 {
                println!("  (no products matched)");
            }
        }
        SendOutcome::FollowUp { question, options } => {
            println!("agent> {question}");
            if !options.is_empty() {
                println!("  options: {}", options.join(" | "));
            }
        }
        SendOutcome::Ignored => {}
        SendOutcome::Busy => println!("Still working on the last request."),
        SendOutcome::Failed { message } => println!("Search failed: {message}"),
    }
}

async fn run_command(engine: &ConversationEngine<AgentClient>, client: &AgentClient, command: &str) {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match name {
        "help" => print_help(),
        "results" => match engine.cached_products().await {
            Ok(products) if !products.is_empty() => print_products(&products),
            Ok(_) => println!("No results yet. Search for something first."),
            Err(e) => println!("Error: {e}"),
        },
        "watch" => match result_at(engine, args.first()).await {
            Some(product) => {
                use shopper_core::WatchOutcome;
                match engine.watch(&product).await {
                    WatchOutcome::Added => println!("Watching {}.", product.title),
                    WatchOutcome::AlreadyWatching => {
                        println!("{} is already on the watchlist.", product.title)
                    }
                    WatchOutcome::Updated { previous, current } => println!(
                        "{} already watched; price moved ${previous:.2} -> ${current:.2}.",
                        product.title
                    ),
                }
            }
            None => println!("Usage: /watch <result number>"),
        },
        "unwatch" => match watchlist_id_at(engine, args.first()).await {
            Some(id) => {
                if engine.unwatch(&id).await {
                    println!("Removed from watchlist.");
                } else {
                    println!("Not on the watchlist.");
                }
            }
            None => println!("Usage: /unwatch <watchlist number>"),
        },
        "target" => {
            let target = match args.get(1) {
                Some(&"clear") => None,
                Some(raw) => match raw.parse::<f64>() {
                    Ok(price) => Some(price),
                    Err(_) => {
                        println!("Usage: /target <watchlist number> <price|clear>");
                        return;
                    }
                },
                None => {
                    println!("Usage: /target <watchlist number> <price|clear>");
                    return;
                }
            };
            match watchlist_id_at(engine, args.first()).await {
                Some(id) => {
                    engine.set_target_price(&id, target).await;
                    println!("Target updated.");
                }
                None => println!("Usage: /target <watchlist number> <price|clear>"),
            }
        }
        "watchlist" => print_watchlist(&engine.profile().await),
        "buy" => match result_at(engine, args.first()).await {
            Some(product) => {
                let profile = engine.profile().await;
                let card = profile
                    .saved_card
                    .as_ref()
                    .map(|c| c.nickname.clone())
                    .unwrap_or_else(|| "default".to_string());
                let entry = engine.record_purchase(&product, &card).await;
                match entry.order_id {
                    Some(order_id) => {
                        println!("Purchased {} for ${:.2} (order {order_id})", entry.title, entry.price)
                    }
                    None => println!("Purchased {} for ${:.2}", entry.title, entry.price),
                }
            }
            None => println!("Usage: /buy <result number>"),
        },
        "checkout" => match result_at(engine, args.first()).await {
            Some(product) => run_checkout(engine, client, &product).await,
            None => println!("Usage: /checkout <result number>"),
        },
        "coupons" => match result_at(engine, args.first()).await {
            Some(product) => match client.coupons(&product.id).await {
                Ok(coupons) if !coupons.is_empty() => {
                    for coupon in coupons {
                        println!("  {} - {} ({})", coupon.code, coupon.discount, coupon.source);
                    }
                }
                Ok(_) => println!("No coupons for {}.", product.title),
                Err(e) => println!("Error: {e}"),
            },
            None => println!("Usage: /coupons <result number>"),
        },
        "spending" => match client.spending().await {
            Ok(overview) => {
                println!(
                    "Total spent: ${:.2} across {} purchase(s)",
                    overview.total_spent, overview.purchase_count
                );
                for (category, amount) in &overview.by_category {
                    println!("  {category}: ${amount:.2}");
                }
            }
            Err(e) => {
                warn!("backend spending unavailable: {}", e);
                let profile = engine.profile().await;
                println!(
                    "Total spent (local): ${:.2} across {} purchase(s)",
                    profile.total_spent(),
                    profile.purchase_history.len()
                );
                for (category, amount) in profile.spending_by_category() {
                    println!("  {category}: ${amount:.2}");
                }
            }
        },
        "shipping" => match engine.refresh_shipping().await {
            Ok(_) => {
                let profile = engine.profile().await;
                if profile.purchase_history.is_empty() {
                    println!("No purchases yet.");
                }
                for entry in &profile.purchase_history {
                    println!(
                        "  {} - {}",
                        entry.title,
                        entry.shipping_status.as_deref().unwrap_or("unknown")
                    );
                }
            }
            Err(e) => println!("Error: {e}"),
        },
        "alerts" => match client.purchase_alerts().await {
            Ok(alerts) if !alerts.is_empty() => {
                for alert in alerts {
                    println!(
                        "  {} dropped to ${:.2} (you paid ${:.2}, save ${:.2} / {:.0}%) [id {}]",
                        alert.product_name,
                        alert.current_market_price,
                        alert.purchased_price,
                        alert.savings,
                        alert.drop_percent,
                        alert.product_id
                    );
                }
            }
            Ok(_) => println!("No price-drop alerts."),
            Err(e) => println!("Error: {e}"),
        },
        "dismiss" => match args.first() {
            Some(id) => match client.dismiss_purchase_alert(id).await {
                Ok(()) => println!("Alert dismissed."),
                Err(e) => println!("Error: {e}"),
            },
            None => println!("Usage: /dismiss <product id>"),
        },
        "tracking" => match client.tracking_status().await {
            Ok(status) => {
                println!(
                    "Tracking {}: watching {} item(s), {} purchase(s)",
                    if status.tracking_running { "running" } else { "stopped" },
                    status.watchlist_count,
                    status.purchase_count
                );
                if status.user_active {
                    println!("  active cadence ({:.1}h until pause)", status.hours_until_pause);
                }
            }
            Err(e) => println!("Error: {e}"),
        },
        "reset" => match engine.reset().await {
            Ok(()) => println!("All local state cleared."),
            Err(e) => println!("Error: {e}"),
        },
        other => println!("Unknown command /{other}. Type /help."),
    }
}

async fn run_checkout(
    engine: &ConversationEngine<AgentClient>,
    client: &AgentClient,
    product: &UiProduct,
) {
    let profile = engine.profile().await;
    let (Some(personal_info), Some(shipping_address)) =
        (profile.personal_info.clone(), profile.shipping_address.clone())
    else {
        println!("Auto-checkout needs your name, email, and shipping address on file.");
        return;
    };
    let request = CheckoutRequest {
        product_name: product.title.clone(),
        personal_info,
        shipping_address,
    };
    match CheckoutSession::start(client, &request).await {
        Ok(mut session) => {
            println!("Streaming checkout progress (ctrl-c to cancel)...");
            loop {
                tokio::select! {
                    status = session.next_status() => match status {
                        Some(status) => println!("  [{}] {}", status.step, status.message),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        println!("Canceling checkout...");
                        session.cancel().await;
                    }
                }
            }
            match session.error().await {
                Some(e) => println!("Checkout did not finish: {e}"),
                None => println!("Checkout stream ended."),
            }
        }
        Err(e) => println!("Could not start checkout: {e}"),
    }
}

/// Resolve a 1-based index argument against the latest results.
async fn result_at(engine: &ConversationEngine<AgentClient>, arg: Option<&&str>) -> Option<UiProduct> {
    let index: usize = arg?.parse().ok()?;
    let products = engine.cached_products().await.ok()?;
    products.get(index.checked_sub(1)?).cloned()
}

/// Resolve a 1-based index argument against the watchlist.
async fn watchlist_id_at(engine: &ConversationEngine<AgentClient>, arg: Option<&&str>) -> Option<String> {
    let index: usize = arg?.parse().ok()?;
    let profile = engine.profile().await;
    let id = profile
        .watchlist
        .iter()
        .nth(index.checked_sub(1)?)
        .map(|item| item.product_id.clone());
    id
}

fn print_products(products: &[UiProduct]) {
    for (i, product) in products.iter().enumerate() {
        println!(
            "  {}. {} - ${:.2} ({}, {:.1}* x{})",
            i + 1,
            product.title,
            product.price,
            product.brand,
            product.rating,
            product.reviews
        );
        if !product.explanation.is_empty() {
            println!("     {}", product.explanation);
        }
        if product.coupons > 0 {
            println!("     {} coupon(s) available", product.coupons);
        }
    }
}

fn print_watchlist(profile: &UserProfile) {
    if profile.watchlist.is_empty() {
        println!("Watchlist is empty. Use /watch after a search.");
        return;
    }
    for (i, item) in profile.watchlist.iter().enumerate() {
        let view = item.view();
        let trend = if view.delta == 0.0 {
            "steady".to_string()
        } else {
            format!("{:+.2} ({:+.1}%)", view.delta, view.percent_change)
        };
        let target = match item.target_price {
            Some(target) if view.hit_target => format!(", target ${target:.2} HIT"),
            Some(target) => format!(", target ${target:.2}"),
            None => String::new(),
        };
        println!(
            "  {}. {} - ${:.2} [{}{}]",
            i + 1,
            item.product_name,
            item.current_price,
            trend,
            target
        );
    }
    let savings = profile.watchlist.total_potential_savings();
    if savings > 0.0 {
        println!("  Potential savings from drops: ${savings:.2}");
    }
}

fn print_help() {
    println!("  <text>              ask the agent to find something");
    println!("  /results            show the latest results again");
    println!("  /watch N            track result N's price");
    println!("  /unwatch N          stop tracking watchlist item N");
    println!("  /target N PRICE     set a target price (or 'clear')");
    println!("  /watchlist          show tracked items and price moves");
    println!("  /buy N              simulate buying result N");
    println!("  /checkout N         run the agent's auto-checkout for result N");
    println!("  /coupons N          list coupons for result N");
    println!("  /spending           spending summary");
    println!("  /shipping           refresh and show shipping statuses");
    println!("  /alerts             price-drop alerts on past purchases");
    println!("  /dismiss ID         dismiss an alert");
    println!("  /tracking           backend tracking status");
    println!("  /reset              wipe all local state");
    println!("  /quit               exit");
}
