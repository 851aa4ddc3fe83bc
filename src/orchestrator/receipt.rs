//! On-chain receipt verification (§4.5). Never throws: every failure mode —
//! transport error, missing transaction, mismatched transfer — collapses to `false`.

use crate::ledger::{LedgerGateway, MirrorTransactionStatus};
use crate::payment::amounts_equal;

pub async fn verify_payment_receipt(
    gateway: &dyn LedgerGateway,
    transaction_id: &str,
    expected_amount: &str,
    expected_recipient: &str,
) -> bool {
    let transaction = match gateway.get_transaction(transaction_id).await {
        Ok(Some(tx)) => tx,
        Ok(None) | Err(_) => return false,
    };

    if transaction.status != MirrorTransactionStatus::Success {
        return false;
    }

    transaction
        .transfers
        .iter()
        .any(|t| t.account == expected_recipient && amounts_equal(&t.amount, expected_amount))
}
