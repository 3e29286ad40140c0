// Module declarations
mod api;
mod clients;
mod config;
mod domain;
mod fixtures;
mod groups;
mod pipelines;
mod solver;
mod strategies;
mod utils;
mod validation;

use std::error::Error;
use std::sync::Arc;

use colored::*;
use dotenv::dotenv;
use tokio::sync::Semaphore;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::entry::optimize_guarded;
use crate::api::types::ApiResult;
use crate::domain::types::Order;
use crate::fixtures::order_generator::random_orders;

const DEFAULT_ORDER_COUNT: usize = 40;
const DEFAULT_TIMEOUT_SECS: u64 = 150;
const FIXTURE_SEED: u64 = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env()) // Reads RUST_LOG
        .with(
            fmt::layer()
                .with_span_events(fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE)
                .compact(),
        )
        .init();

    dotenv().ok();

    // Usage: cargoptim <cliente> [canal] [orders.csv | order-count]
    let args: Vec<String> = std::env::args().collect();
    let client = args.get(1).cloned().unwrap_or_else(|| "cencosud".to_string());
    let channel = args.get(2).cloned();
    let source = args.get(3).cloned();

    let cfg = clients::get(&client)?;
    let orders = match source {
        Some(s) if s.ends_with(".csv") => {
            info!(path = %s, "cargando pedidos desde CSV");
            load_orders_csv(&s)?
        }
        Some(s) => {
            let n: usize = s.parse().unwrap_or(DEFAULT_ORDER_COUNT);
            random_orders(n, FIXTURE_SEED, &cfg)
        }
        None => random_orders(DEFAULT_ORDER_COUNT, FIXTURE_SEED, &cfg),
    };

    info!(
        "Optimizando {} pedidos para {} ({})",
        orders.len(),
        client,
        channel.as_deref().unwrap_or("default")
    );

    let cpu_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let semaphore = Arc::new(Semaphore::new(cpu_count.saturating_sub(1).max(1)));

    let response = optimize_guarded(
        semaphore,
        client.clone(),
        channel,
        orders,
        DEFAULT_TIMEOUT_SECS,
        None,
        None,
    )
    .await?;

    print_result("VCU", &response.vcu);
    print_result("BINPACKING", &response.binpacking);

    let out_path = format!(
        "resultado_{}_{}.json",
        client,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    std::fs::write(&out_path, serde_json::to_string_pretty(&response)?)?;
    info!(path = %out_path, "resultado exportado");

    Ok(())
}

fn print_result(label: &str, result: &ApiResult) {
    let stats = &result.estadisticas;
    println!("\n=== {} ===", label.bold());
    println!(
        "camiones: {} (normal {}, bh {})",
        stats.cantidad_camiones, stats.cantidad_camiones_normal, stats.cantidad_camiones_bh
    );
    println!(
        "pedidos asignados: {}/{}",
        stats.cantidad_pedidos_asignados, stats.total_pedidos
    );

    let vcu_line = format!("VCU promedio: {:.3}", stats.promedio_vcu);
    if stats.promedio_vcu >= 0.8 {
        println!("{}", vcu_line.green());
    } else {
        println!("{}", vcu_line.yellow());
    }

    if let Some(validation) = &stats.validacion {
        println!(
            "validación: {} ok, {} fallidos, {} sin validar ({:.1}%)",
            validation.camiones_validos,
            validation.camiones_invalidos,
            validation.camiones_no_validados,
            validation.tasa_validacion
        );
    }
    for truck in &result.camiones {
        println!(
            "  {} [{}] {} pedidos, vcu {:.3}, pos {:.1}",
            truck.id,
            truck.tipo_camion.as_str(),
            truck.pedidos.len(),
            truck.vcu_max,
            truck.pos_total
        );
    }
    if !result.pedidos_no_incluidos.is_empty() {
        let line = format!("no incluidos: {}", result.pedidos_no_incluidos.len());
        println!("{}", line.red());
    }
}

/// Boundary CSV loader. One row per order; SKU detail arrives through the
/// richer ingestion path, not this file format.
fn load_orders_csv(path: &str) -> Result<Vec<Order>, Box<dyn Error>> {
    #[derive(serde::Deserialize)]
    struct Row {
        #[serde(rename = "PEDIDO")]
        pedido: String,
        #[serde(rename = "CD")]
        cd: String,
        #[serde(rename = "CE")]
        ce: String,
        #[serde(rename = "PO")]
        po: String,
        #[serde(rename = "PESO")]
        peso: f64,
        #[serde(rename = "VOL")]
        vol: f64,
        #[serde(rename = "PALLETS")]
        pallets: f64,
        #[serde(rename = "VALOR", default)]
        valor: f64,
        #[serde(rename = "OC", default)]
        oc: Option<String>,
        #[serde(rename = "PALLETS_REAL", default)]
        pallets_real: Option<f64>,
        #[serde(rename = "CHOCOLATES", default)]
        chocolates: Option<String>,
        #[serde(rename = "BASE", default)]
        base: f64,
        #[serde(rename = "SUPERIOR", default)]
        superior: f64,
        #[serde(rename = "FLEXIBLE", default)]
        flexible: f64,
        #[serde(rename = "NO_APILABLE", default)]
        no_apilable: f64,
        #[serde(rename = "SI_MISMO", default)]
        si_mismo: f64,
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut orders = vec![];
    for row in reader.deserialize::<Row>() {
        let row = row?;
        let order = Order {
            id: row.pedido,
            po: row.po,
            cd: row.cd,
            ce: row.ce,
            flow: row.oc.filter(|s| !s.is_empty()),
            weight_kg: row.peso,
            volume_m3: row.vol,
            pallets: row.pallets,
            pallets_real: row.pallets_real,
            value: row.valor,
            coffee_value: 0.0,
            chocolates: row.chocolates.as_deref() == Some("SI"),
            valuable: false,
            pdq: false,
            low_turnover: false,
            directed_lot: false,
            base: row.base,
            superior: row.superior,
            flexible: row.flexible,
            no_apilable: row.no_apilable,
            si_mismo: row.si_mismo,
            skus: vec![],
            assignment: None,
        };
        order.validate()?;
        orders.push(order);
    }
    info!("{} pedidos cargados", orders.len());
    Ok(orders)
}
