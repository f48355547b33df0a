//! The DC state machine.
//!
//! ```text
//! pending ──MARK_RETURNED──▶ returned ──LINK_INVOICE──▶ completed
//!    ▲                        │  ▲  ▲                      │
//!    └──MOVE_BACK_TO_PENDING──┘  │  └─MOVE_BACK_TO_RETURNED┘
//!                          MOVE_TO_CASH
//!                                ▼
//!                              cash ──MOVE_CASH_TO_COMPLETED──▶ completed
//! ```
//!
//! `apply_transition` is pure: it validates, snapshots the fields it is
//! about to clear, applies the update and appends exactly one history entry.

use chrono::{DateTime, Utc};

use super::{LifecycleError, LifecycleResult};
use crate::models::{
    ClearedFields, DcStatus, HistoryAction, HistoryEntry, HistoryMeta, SavedDc,
};

/// A requested status change with its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    MarkReturned {
        returned_by: String,
        remarks: Option<String>,
    },
    /// Completes a returned record, or a cash record via `MOVE_CASH_TO_COMPLETED`.
    LinkInvoice {
        invoice_ref: String,
        remarks: Option<String>,
    },
    MoveCashToCompleted {
        invoice_ref: String,
        remarks: Option<String>,
    },
    MoveToCash {
        amount: f64,
        remarks: Option<String>,
    },
    MoveBackToPending,
    MoveBackToReturned,
}

impl Transition {
    /// The action recorded when this transition is applied from `status`.
    pub fn action_from(&self, status: DcStatus) -> HistoryAction {
        match self {
            Transition::MarkReturned { .. } => HistoryAction::MarkReturned,
            Transition::LinkInvoice { .. } if status == DcStatus::Cash => {
                HistoryAction::MoveCashToCompleted
            }
            Transition::LinkInvoice { .. } => HistoryAction::LinkInvoice,
            Transition::MoveCashToCompleted { .. } => HistoryAction::MoveCashToCompleted,
            Transition::MoveToCash { .. } => HistoryAction::MoveToCash,
            Transition::MoveBackToPending => HistoryAction::MoveBackToPending,
            Transition::MoveBackToReturned => HistoryAction::MoveBackToReturned,
        }
    }
}

/// Apply `transition` to `dc`, returning the updated record.
pub fn apply_transition(
    dc: &SavedDc,
    transition: &Transition,
    now: DateTime<Utc>,
) -> LifecycleResult<SavedDc> {
    let from_status = dc.status;
    let action = transition.action_from(from_status);
    check_guard(dc, action)?;

    let mut next = dc.clone();
    let mut cleared = ClearedFields::default();

    match transition {
        Transition::MarkReturned {
            returned_by,
            remarks,
        } => {
            next.returned_by = Some(required(returned_by, "returnedBy")?);
            next.returned_at = Some(now);
            next.returned_remarks = optional(remarks);
            next.status = DcStatus::Returned;
        }
        Transition::LinkInvoice {
            invoice_ref,
            remarks,
        }
        | Transition::MoveCashToCompleted {
            invoice_ref,
            remarks,
        } => {
            next.invoice_ref = Some(required(invoice_ref, "invoiceRef")?);
            next.invoice_remarks = optional(remarks);
            if action == HistoryAction::MoveCashToCompleted {
                cleared.cash_at = next.cash_at.take();
                cleared.cash_amount = next.cash_amount.take();
                cleared.cash_remarks = next.cash_remarks.take();
            }
            next.status = DcStatus::Completed;
        }
        Transition::MoveToCash { amount, remarks } => {
            if !amount.is_finite() || *amount <= 0.0 {
                return Err(LifecycleError::Validation(format!(
                    "cashAmount must be a positive number, got {}",
                    amount
                )));
            }
            next.cash_at = Some(now);
            next.cash_amount = Some(*amount);
            next.cash_remarks = optional(remarks);
            next.status = DcStatus::Cash;
        }
        Transition::MoveBackToPending => {
            cleared.returned_by = next.returned_by.take();
            cleared.returned_at = next.returned_at.take();
            cleared.returned_remarks = next.returned_remarks.take();
            next.status = DcStatus::Pending;
        }
        Transition::MoveBackToReturned => {
            cleared.invoice_ref = next.invoice_ref.take();
            cleared.invoice_remarks = next.invoice_remarks.take();
            next.status = DcStatus::Returned;
        }
    }

    let meta = (!cleared.is_empty()).then(|| HistoryMeta {
        cleared: Some(cleared),
    });
    next.history.push(HistoryEntry {
        at: now,
        action,
        from_status: Some(from_status),
        to_status: next.status,
        meta,
    });

    Ok(next)
}

fn check_guard(dc: &SavedDc, action: HistoryAction) -> LifecycleResult<()> {
    let allowed = match action {
        HistoryAction::MarkReturned => dc.status == DcStatus::Pending,
        HistoryAction::LinkInvoice
        | HistoryAction::MoveToCash
        | HistoryAction::MoveBackToPending => dc.status == DcStatus::Returned,
        HistoryAction::MoveCashToCompleted => dc.status == DcStatus::Cash,
        // Cash-settled completions cannot be reopened
        HistoryAction::MoveBackToReturned => {
            dc.status == DcStatus::Completed
                && dc.last_completion() == Some(HistoryAction::LinkInvoice)
        }
        HistoryAction::Created => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition {
            action,
            status: dc.status,
        })
    }
}

fn required(value: &str, field: &str) -> LifecycleResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LifecycleError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
