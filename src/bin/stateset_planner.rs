use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use stateset_planner::config::{init_tracing, load_config, AppConfig};
use stateset_planner::db::{establish_connection_from_app_config, run_migrations};
use stateset_planner::entities::bom_line::ConsumeStage;
use stateset_planner::entities::inventory_txn::TxnKind;
use stateset_planner::entities::item::{ItemKind, ProcurementType};
use stateset_planner::services::catalog::NewBomLine;
use stateset_planner::services::inventory_ledger::PostTxn;
use stateset_planner::services::item_master::{ItemFilter, NewItem};
use stateset_planner::services::mrp::MrpTrigger;
use stateset_planner::services::production_lifecycle::NewProductionOrder;
use stateset_planner::services::ServiceFactory;

#[derive(Parser)]
#[command(name = "stateset-planner", about = "Planning and fulfillment engine for 3D-print-farm manufacturing", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Create a finished good, component, supply, or service item.
    ItemCreate {
        #[arg(long)]
        sku: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long, value_enum)]
        kind: ItemKindArg,
        #[arg(long, value_enum)]
        procurement: ProcurementArg,
        #[arg(long)]
        stock_unit: String,
        #[arg(long, default_value = "0")]
        standard_cost: Decimal,
        #[arg(long, default_value = "0")]
        reorder_point: Decimal,
        #[arg(long, default_value = "0")]
        safety_stock: Decimal,
        #[arg(long, default_value = "0")]
        lead_time_days: i32,
    },
    /// List items, optionally filtered to those at or below their reorder point.
    ItemList {
        #[arg(long)]
        low_stock_only: bool,
    },
    /// Post a ledger transaction directly (receipt, adjustment, scrap, etc).
    InventoryPost {
        #[arg(long)]
        item_id: i64,
        #[arg(long)]
        location_id: i64,
        #[arg(long)]
        quantity: Decimal,
        #[arg(long, value_enum)]
        kind: TxnKindArg,
        #[arg(long)]
        ref_kind: String,
        #[arg(long)]
        ref_id: String,
    },
    /// Move quantity between two locations.
    InventoryTransfer {
        #[arg(long)]
        item_id: i64,
        #[arg(long)]
        from: i64,
        #[arg(long)]
        to: i64,
        #[arg(long)]
        quantity: Decimal,
        #[arg(long)]
        ref_id: String,
    },
    /// Create a BOM revision with one flat component line (repeat the command to add more lines
    /// to the same revision is not supported; compose a richer fixture through the library API
    /// for multi-line BOMs).
    BomCreate {
        #[arg(long)]
        parent_item_id: i64,
        #[arg(long)]
        revision: String,
        #[arg(long)]
        component_id: i64,
        #[arg(long)]
        qty_per: Decimal,
        #[arg(long)]
        unit: String,
        #[arg(long, default_value = "0")]
        scrap_factor: Decimal,
        #[arg(long)]
        effective_from: NaiveDate,
    },
    /// Trigger an MRP run over confirmed demand.
    MrpRun {
        #[arg(long)]
        horizon_days: Option<i64>,
        #[arg(long)]
        include_safety_stock: bool,
        #[arg(long)]
        no_cascade: bool,
    },
    /// Show blocking issues for a sales order.
    BlockingIssuesSalesOrder {
        #[arg(long)]
        sales_order_id: i64,
    },
    /// Show blocking issues for a production order.
    BlockingIssuesProductionOrder {
        #[arg(long)]
        production_order_id: i64,
    },
    /// Create a draft production order.
    ProductionOrderCreate {
        #[arg(long)]
        item_id: i64,
        #[arg(long)]
        qty_ordered: Decimal,
        #[arg(long)]
        needed_date: Option<NaiveDate>,
        #[arg(long)]
        sales_order_id: Option<i64>,
        #[arg(long)]
        sales_order_line_id: Option<i64>,
    },
    /// Release a draft production order, reserving its production-stage materials.
    ProductionOrderRelease {
        #[arg(long)]
        production_order_id: i64,
        #[arg(long)]
        location_id: i64,
    },
    /// Start a released production order.
    ProductionOrderStart {
        #[arg(long)]
        production_order_id: i64,
    },
    /// Record a completed operation: consumes reserved material, receives output, sends to QC.
    ProductionOrderComplete {
        #[arg(long)]
        production_order_id: i64,
        #[arg(long)]
        location_id: i64,
        #[arg(long, default_value = "0")]
        qty_completed: Decimal,
        #[arg(long, default_value = "0")]
        qty_scrapped: Decimal,
    },
    /// Pass quality inspection.
    ProductionOrderPassQc {
        #[arg(long)]
        production_order_id: i64,
    },
    /// Ship a complete production order.
    ProductionOrderShip {
        #[arg(long)]
        production_order_id: i64,
        #[arg(long)]
        location_id: i64,
    },
    /// Cancel a non-terminal production order, releasing its active reservations.
    ProductionOrderCancel {
        #[arg(long)]
        production_order_id: i64,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum ItemKindArg {
    FinishedGood,
    Component,
    Supply,
    Service,
}

impl From<ItemKindArg> for ItemKind {
    fn from(value: ItemKindArg) -> Self {
        match value {
            ItemKindArg::FinishedGood => ItemKind::FinishedGood,
            ItemKindArg::Component => ItemKind::Component,
            ItemKindArg::Supply => ItemKind::Supply,
            ItemKindArg::Service => ItemKind::Service,
        }
    }
}

#[derive(Clone, clap::ValueEnum)]
enum ProcurementArg {
    Make,
    Buy,
    MakeOrBuy,
}

impl From<ProcurementArg> for ProcurementType {
    fn from(value: ProcurementArg) -> Self {
        match value {
            ProcurementArg::Make => ProcurementType::Make,
            ProcurementArg::Buy => ProcurementType::Buy,
            ProcurementArg::MakeOrBuy => ProcurementType::MakeOrBuy,
        }
    }
}

#[derive(Clone, clap::ValueEnum)]
enum TxnKindArg {
    Receipt,
    Adjustment,
    Scrap,
    Issue,
}

impl From<TxnKindArg> for TxnKind {
    fn from(value: TxnKindArg) -> Self {
        match value {
            TxnKindArg::Receipt => TxnKind::Receipt,
            TxnKindArg::Adjustment => TxnKind::Adjustment,
            TxnKindArg::Scrap => TxnKind::Scrap,
            TxnKindArg::Issue => TxnKind::Issue,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config: AppConfig = load_config().unwrap_or_else(|err| {
        eprintln!("failed to load configuration, falling back to defaults: {err}");
        AppConfig::new("sqlite://stateset-planner.db?mode=rwc".to_string(), "development".to_string())
    });
    init_tracing(&config.log_level, config.log_json);

    let db = establish_connection_from_app_config(&config).await?;
    if config.auto_migrate {
        run_migrations(&db).await?;
    }

    let factory = ServiceFactory::new(db, config.clone());
    let cli = Cli::parse();

    match cli.command {
        Command::Migrate => {
            println!("migrations applied");
        }
        Command::ItemCreate {
            sku,
            name,
            kind,
            procurement,
            stock_unit,
            standard_cost,
            reorder_point,
            safety_stock,
            lead_time_days,
        } => {
            let item = factory
                .item_master()
                .create_item(NewItem {
                    sku,
                    name,
                    kind: kind.into(),
                    procurement: procurement.into(),
                    stock_unit,
                    material_type_id: None,
                    color_id: None,
                    standard_cost,
                    reorder_point,
                    safety_stock,
                    lead_time_days,
                    lot_tracked: false,
                })
                .await?;
            println!("created item {} ({})", item.sku, item.id);
        }
        Command::ItemList { low_stock_only } => {
            let items = factory.item_master().list(ItemFilter { low_stock_only, ..Default::default() }).await?;
            for item in items {
                println!("{}\t{}\t{:?}\t{:?}", item.id, item.sku, item.kind, item.procurement);
            }
        }
        Command::InventoryPost { item_id, location_id, quantity, kind, ref_kind, ref_id } => {
            let txn_id = factory
                .inventory_ledger()
                .post(PostTxn {
                    item_id,
                    location_id,
                    quantity,
                    kind: kind.into(),
                    ref_kind,
                    ref_id,
                    lot_id: None,
                    idempotency_key: None,
                    created_by: "cli".to_string(),
                })
                .await?;
            println!("posted transaction {txn_id}");
        }
        Command::InventoryTransfer { item_id, from, to, quantity, ref_id } => {
            let (out_id, in_id) = factory.inventory_ledger().transfer(item_id, from, to, quantity, ref_id).await?;
            println!("transferred: out={out_id} in={in_id}");
        }
        Command::BomCreate { parent_item_id, revision, component_id, qty_per, unit, scrap_factor, effective_from } => {
            let bom = factory
                .catalog()
                .create_bom(
                    parent_item_id,
                    revision,
                    true,
                    effective_from,
                    None,
                    vec![NewBomLine {
                        seq: 1,
                        component_id,
                        qty_per,
                        unit,
                        scrap_factor,
                        consume_stage: ConsumeStage::Production,
                        cost_only: false,
                    }],
                )
                .await?;
            println!("created BOM revision {} for item {}", bom.revision, bom.parent_item_id);
        }
        Command::MrpRun { horizon_days, include_safety_stock, no_cascade } => {
            let mut trigger: MrpTrigger = factory.default_mrp_trigger();
            if let Some(days) = horizon_days {
                trigger.horizon_days = days;
            }
            trigger.include_safety_stock = include_safety_stock;
            if no_cascade {
                trigger.cascade_sub_assembly_due_dates = false;
            }
            let (run, output) = factory.mrp().run(trigger).await?;
            println!("MRP run {} produced {} planned orders ({} warnings)", run.id, output.planned_orders.len(), output.warnings.len());
            for planned in &output.planned_orders {
                println!(
                    "  {:?} item={} qty={} release={} need={}",
                    planned.kind, planned.item_id, planned.quantity, planned.release_date, planned.need_date
                );
            }
            for warning in &output.warnings {
                println!("  warning: item={} {}", warning.item_id, warning.message);
            }
        }
        Command::BlockingIssuesSalesOrder { sales_order_id } => {
            let analysis = factory.blocking_issues().sales_order_issues(sales_order_id).await?;
            print_analysis(&analysis);
        }
        Command::BlockingIssuesProductionOrder { production_order_id } => {
            let analysis = factory.blocking_issues().production_order_issues(production_order_id).await?;
            print_analysis(&analysis);
        }
        Command::ProductionOrderCreate { item_id, qty_ordered, needed_date, sales_order_id, sales_order_line_id } => {
            let po = factory
                .production_lifecycle()
                .create(NewProductionOrder {
                    item_id,
                    qty_ordered,
                    sales_order_id,
                    sales_order_line_id,
                    needed_date,
                    work_center_id: None,
                })
                .await?;
            println!("created production order {} ({})", po.code, po.id);
        }
        Command::ProductionOrderRelease { production_order_id, location_id } => {
            let po = factory.production_lifecycle().release(production_order_id, location_id).await?;
            println!("{} -> {:?}", po.code, po.status);
        }
        Command::ProductionOrderStart { production_order_id } => {
            let po = factory.production_lifecycle().start(production_order_id).await?;
            println!("{} -> {:?}", po.code, po.status);
        }
        Command::ProductionOrderComplete { production_order_id, location_id, qty_completed, qty_scrapped } => {
            let po = factory
                .production_lifecycle()
                .complete_operation(production_order_id, location_id, qty_completed, qty_scrapped)
                .await?;
            println!("{} -> {:?}", po.code, po.status);
        }
        Command::ProductionOrderPassQc { production_order_id } => {
            let po = factory.production_lifecycle().pass_qc(production_order_id).await?;
            println!("{} -> {:?}", po.code, po.status);
        }
        Command::ProductionOrderShip { production_order_id, location_id } => {
            let po = factory.production_lifecycle().ship(production_order_id, location_id).await?;
            println!("{} -> {:?}", po.code, po.status);
        }
        Command::ProductionOrderCancel { production_order_id } => {
            let po = factory.production_lifecycle().cancel(production_order_id).await?;
            println!("{} -> {:?}", po.code, po.status);
        }
    }

    Ok(())
}

fn print_analysis(analysis: &stateset_planner::domain::blocking_issues::Analysis) {
    println!("can_proceed={} issue_count={}", analysis.can_proceed, analysis.issue_count);
    for issue in &analysis.issues {
        println!("  [{:?}] {}", issue.issue_type, issue.message);
    }
    for action in &analysis.actions {
        println!("  action(priority={}): {}", action.priority, action.description);
    }
}
