use async_trait::async_trait;

use railbook_domain::payment::{CheckoutSession, LineItem, PaymentProvider};
use railbook_domain::ticket::TicketArtifacts;

/// In-process stand-in for the hosted checkout provider. Returns a
/// deterministic token; an order id containing "fail-provider" simulates a
/// provider outage for testing the inert-record path.
pub struct MockPaymentProvider;

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_transaction(
        &self,
        order_id: &str,
        gross_amount: i64,
        _items: &[LineItem],
    ) -> Result<CheckoutSession, Box<dyn std::error::Error + Send + Sync>> {
        if order_id.contains("fail-provider") {
            return Err("simulated payment gateway failure".into());
        }
        Ok(CheckoutSession {
            token: format!("mock_snap_{}_{}", order_id, gross_amount),
            redirect_url: format!("https://payments.example/redirect/{}", order_id),
        })
    }
}

/// Records a fake artifact reference instead of rendering a QR image.
pub struct MockTicketArtifacts;

#[async_trait]
impl TicketArtifacts for MockTicketArtifacts {
    async fn generate(
        &self,
        ticket_no: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(format!("qr://{}", ticket_no))
    }
}
