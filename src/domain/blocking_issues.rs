use chrono::NaiveDate;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Blocking,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueType {
    ProductionIncomplete,
    ProductionMissing,
    MaterialShortage,
    PurchasePending,
    InventoryReserved,
    QualityHold,
}

impl IssueType {
    pub fn severity(&self) -> Severity {
        match self {
            IssueType::ProductionIncomplete | IssueType::ProductionMissing | IssueType::MaterialShortage | IssueType::QualityHold => Severity::Blocking,
            IssueType::PurchasePending | IssueType::InventoryReserved => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Issue {
    pub issue_type: IssueType,
    pub item_id: Option<i64>,
    pub message: String,
    pub reference_type: String,
    pub reference_id: String,
}

impl Issue {
    pub fn severity(&self) -> Severity {
        self.issue_type.severity()
    }
}

/// A suggested action to resolve one or more issues, ranked by `priority` (lower = more urgent):
/// expedite existing PO (0) > create missing PO (1) > complete in-flight production (2) >
/// create missing production (3) > reassign reservation (4).
#[derive(Debug, Clone)]
pub struct ResolutionAction {
    pub priority: u8,
    pub description: String,
    pub reference_type: String,
    pub reference_id: String,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub can_proceed: bool,
    pub issue_count: usize,
    pub estimated_ready_date: Option<NaiveDate>,
    pub issues: Vec<Issue>,
    pub actions: Vec<ResolutionAction>,
}

impl Analysis {
    pub fn empty() -> Self {
        Self {
            can_proceed: true,
            issue_count: 0,
            estimated_ready_date: None,
            issues: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn has_blocking(&self) -> bool {
        self.issues.iter().any(|i| i.severity() == Severity::Blocking)
    }
}

/// Per-material shortage breakdown line used to build `Analysis::issues`.
#[derive(Debug, Clone)]
pub struct MaterialShortfall {
    pub item_id: i64,
    pub required: Decimal,
    pub available: Decimal,
    pub on_hand: Decimal,
    pub shortage: Decimal,
}
