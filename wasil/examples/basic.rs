//! Basic example of the Wasil container.
//!
//! Run with `RUST_LOG=wasil=trace cargo run --example basic` to watch every
//! lookup.

use std::error::Error;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use wasil::{Container, Injectable, Instance};

// === Define your types ===

#[derive(Injectable)]
#[injectable(id = "logger")]
struct ConsoleLogger {
    #[inject(default = "[LOG]")]
    prefix: String,
}

impl ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("{} {msg}", self.prefix);
    }
}

fn default_url() -> String {
    "postgres://localhost/myapp".to_string()
}

#[derive(Deserialize)]
struct DatabaseOptions {
    #[serde(default = "default_url")]
    url: String,
    #[serde(default)]
    verbose: bool,
}

#[derive(Injectable)]
#[injectable(id = "database")]
struct Database {
    #[inject(service = "logger")]
    logger: Arc<ConsoleLogger>,
    #[inject(config)]
    options: DatabaseOptions,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        if self.options.verbose {
            self.logger.log(&format!("Executing: {sql}"));
        }
        format!("Results from {}", self.options.url)
    }
}

#[derive(Injectable)]
#[injectable(id = "users.repository")]
struct UserRepository {
    #[inject(service)]
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

#[derive(Injectable)]
#[injectable(id = "users.service")]
struct UserService {
    #[inject(service = "users")]
    repo: Arc<UserRepository>,
    #[inject(property, service = "log")]
    logger: Option<Arc<ConsoleLogger>>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        if let Some(logger) = &self.logger {
            logger.log(&format!("Getting user {id}"));
        }
        self.repo.find_user(id)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing (logging)
    wasil::logging::init("wasil=debug")?;

    // Every derived type is already known; only aliases are wired by hand
    let container = Container::default();
    container.alias("users.repository", "users");
    container.alias("logger", "log");

    // Anything without a type of its own can come from a factory
    container.factory("banner", |c| {
        let db = c.get_as::<Database>("database")?;
        Ok(Arc::new(format!("Connected to {}", db.options.url)) as Instance)
    })?;

    // Fail fast on missing or circular dependencies
    container.validate(["users.service"])?;
    println!("✅ Dependency graph is valid");

    let service = container.resolve::<UserService>()?;
    println!("👤 {}", service.get_user(42));

    // Singletons are shared
    let again = container.resolve::<UserService>()?;
    println!("🔁 Same service: {}", Arc::ptr_eq(&service, &again));

    let banner = container.get_as::<String>("banner")?;
    tracing::info!(banner = %banner, "Factory output");

    // A one-off database from configuration; the shared one is untouched
    let analytics = container.create_from_value(json!({
        "class": "database",
        "url": "postgres://analytics/warehouse",
        "verbose": true,
    }));
    match analytics {
        Ok(instance) => {
            let db = instance.downcast_ref::<Database>().ok_or("not a database")?;
            println!("📊 {}", db.query("SELECT 1"));
        }
        Err(err) => println!("⚠️  {err}"),
    }

    println!("{container:?}");
    println!("\n🎉 Everything works!");
    Ok(())
}
