use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::app_conf::public_quote_url;
use crate::dto::common::{non_blank, PaginatedResponse, PaginationQuery};
use crate::dto::document_dto::{DocumentKind, QuoteDocument};
use crate::dto::quote_dto::{
    PaymentRequest, PublicQuoteResponse, QuoteItemRequest, QuoteListQuery, QuoteRequest, RejectRequest,
    UpdateStatusRequest,
};
use crate::model::client::Client;
use crate::model::notification::NotificationKind;
use crate::model::payment::Payment;
use crate::model::quote::{Quote, QuoteItem, QuoteStatus, QuoteWithItems};
use crate::model::user::User;
use crate::repository::client_repo::ClientRepository;
use crate::repository::payment_repo::PaymentRepository;
use crate::repository::quote_repo::{QuoteFilter, QuoteRepository};
use crate::repository::review_repo::ReviewRepository;
use crate::repository::user_repo::UserRepository;
use crate::service::notification_service::NotificationService;
use crate::service::plan_service::{self, PlanError, PlanPolicy, QuoteSlot};
use crate::service::quote_document::{build_document, client_block, provider_block, DocumentParts};
use crate::service::user_service::load_user;
use crate::util::email::{QuoteEmail, QuoteMailer};
use crate::util::error::ServiceError;
use crate::util::money::format_brl;

#[async_trait]
pub trait QuoteService: Send + Sync {
    async fn create_quote(&self, user_id: Uuid, request: QuoteRequest) -> Result<QuoteWithItems, ServiceError>;
    async fn duplicate_quote(&self, user_id: Uuid, id: Uuid) -> Result<QuoteWithItems, ServiceError>;
    async fn get_quote(&self, user_id: Uuid, id: Uuid) -> Result<QuoteWithItems, ServiceError>;
    async fn list_quotes(&self, user_id: Uuid, query: QuoteListQuery) -> Result<PaginatedResponse<Quote>, ServiceError>;
    async fn update_quote(&self, user_id: Uuid, id: Uuid, request: QuoteRequest) -> Result<QuoteWithItems, ServiceError>;
    async fn delete_quote(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError>;
    async fn send_quote(&self, user_id: Uuid, id: Uuid) -> Result<Quote, ServiceError>;
    async fn update_status(&self, user_id: Uuid, id: Uuid, request: UpdateStatusRequest) -> Result<Quote, ServiceError>;
    async fn register_payment(&self, user_id: Uuid, id: Uuid, request: PaymentRequest) -> Result<Quote, ServiceError>;
    async fn document(&self, user_id: Uuid, id: Uuid) -> Result<QuoteDocument, ServiceError>;
    async fn view_public(&self, token: Uuid) -> Result<PublicQuoteResponse, ServiceError>;
    async fn public_document(&self, token: Uuid) -> Result<QuoteDocument, ServiceError>;
    async fn approve_public(&self, token: Uuid) -> Result<Quote, ServiceError>;
    async fn reject_public(&self, token: Uuid, request: RejectRequest) -> Result<Quote, ServiceError>;
    async fn receipt(&self, token: Uuid) -> Result<QuoteDocument, ServiceError>;
}

pub struct QuoteServiceImpl {
    pub quote_repo: Arc<dyn QuoteRepository>,
    pub client_repo: Arc<dyn ClientRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub review_repo: Arc<dyn ReviewRepository>,
    pub notifications: Arc<dyn NotificationService>,
    pub mailer: Option<Arc<dyn QuoteMailer>>,
    pub policy: PlanPolicy,
    pub public_app_url: String,
}

/// Line items with totals computed, plus the subtotal.
pub fn build_items(quote_id: Uuid, requests: &[QuoteItemRequest]) -> Result<(Vec<QuoteItem>, i64), ServiceError> {
    if requests.is_empty() {
        return Err(ServiceError::InvalidInput("A quote needs at least one item".to_string()));
    }
    let mut subtotal = 0i64;
    let mut items = Vec::with_capacity(requests.len());
    for (index, item) in requests.iter().enumerate() {
        if !(item.quantity.is_finite() && item.quantity > 0.0) {
            return Err(ServiceError::InvalidInput(format!("Item {} has an invalid quantity", index + 1)));
        }
        if item.unit_price_cents < 0 {
            return Err(ServiceError::InvalidInput(format!("Item {} has a negative price", index + 1)));
        }
        let total = QuoteItem::line_total(item.quantity, item.unit_price_cents)
            .ok_or_else(|| ServiceError::InvalidInput(format!("Item {} total is too large", index + 1)))?;
        subtotal = subtotal
            .checked_add(total)
            .ok_or_else(|| ServiceError::InvalidInput("Quote subtotal is too large".to_string()))?;
        items.push(QuoteItem {
            id: Uuid::new_v4(),
            quote_id,
            description: item.description.trim().to_string(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            total_cents: total,
            position: index as i32 + 1,
        });
    }
    Ok((items, subtotal))
}

/// Total after discount; the discount must lie between zero and the subtotal.
pub fn quote_total(subtotal: i64, discount: i64) -> Result<i64, ServiceError> {
    match subtotal.checked_sub(discount) {
        Some(total) if discount >= 0 && total >= 0 => Ok(total),
        _ => Err(ServiceError::InvalidInput("Discount must be between zero and the subtotal".to_string())),
    }
}

fn illegal_transition(from: QuoteStatus, to: QuoteStatus) -> ServiceError {
    ServiceError::Conflict(format!("Quote cannot go from {} to {}", from, to))
}

impl QuoteServiceImpl {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        quote_repo: Arc<dyn QuoteRepository>,
        client_repo: Arc<dyn ClientRepository>,
        user_repo: Arc<dyn UserRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        review_repo: Arc<dyn ReviewRepository>,
        notifications: Arc<dyn NotificationService>,
        mailer: Option<Arc<dyn QuoteMailer>>,
        policy: PlanPolicy,
        public_app_url: String,
    ) -> Self {
        Self {
            quote_repo,
            client_repo,
            user_repo,
            payment_repo,
            review_repo,
            notifications,
            mailer,
            policy,
            public_app_url,
        }
    }

    async fn owned_quote(&self, user_id: Uuid, id: Uuid) -> Result<Quote, ServiceError> {
        self.quote_repo
            .find(user_id, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Quote not found".to_string()))
    }

    async fn owned_client(&self, user_id: Uuid, client_id: Uuid) -> Result<Client, ServiceError> {
        self.client_repo
            .find(user_id, client_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Client not found".to_string()))
    }

    /// Quote behind a public link. Drafts have not been shared yet and stay hidden.
    async fn public_quote(&self, token: Uuid) -> Result<Quote, ServiceError> {
        match self.quote_repo.find_by_public_token(token).await? {
            Some(quote) if quote.status != QuoteStatus::Draft => Ok(quote),
            _ => Err(ServiceError::NotFound("Quote not found".to_string())),
        }
    }

    /// Charges a plan slot, then stores the quote. The slot is given back when
    /// the quote cannot be stored.
    async fn store_new_quote(
        &self,
        user_id: Uuid,
        draft: Quote,
        items: Vec<QuoteItem>,
    ) -> Result<QuoteWithItems, ServiceError> {
        let now = Utc::now();
        load_user(self.user_repo.as_ref(), user_id, now).await?;
        let limit = self.policy.free_monthly_quote_limit;
        let Some(user) = self.user_repo.consume_quote_slot(user_id, limit, now).await? else {
            let err = PlanError::QuotaExceeded { limit };
            warn!("Quote quota exhausted: {err}");
            return Err(err.into());
        };
        let slot = plan_service::charged_slot(&user, &self.policy, now);

        let created = self.insert_numbered(user_id, draft, items).await;
        match &created {
            Ok(q) => info!(quote_id = %q.quote.id, number = q.quote.number, slot = ?slot, "Quote created"),
            Err(e) => {
                error!("Failed to create quote: {e}");
                if let Err(release) = self.user_repo.release_quote_slot(user_id, slot == QuoteSlot::Bonus).await {
                    error!("Failed to release quote slot: {release}");
                }
            }
        }
        created
    }

    async fn insert_numbered(
        &self,
        user_id: Uuid,
        mut quote: Quote,
        items: Vec<QuoteItem>,
    ) -> Result<QuoteWithItems, ServiceError> {
        quote.number = self.quote_repo.next_number(user_id).await?;
        Ok(self.quote_repo.insert(quote, items).await?)
    }

    async fn with_items(&self, quote: Quote) -> Result<QuoteWithItems, ServiceError> {
        let items = self.quote_repo.items(quote.id).await?;
        Ok(QuoteWithItems { quote, items })
    }

    async fn render(&self, kind: DocumentKind, quote: Quote, now: DateTime<Utc>) -> Result<QuoteDocument, ServiceError> {
        let owner = load_user(self.user_repo.as_ref(), quote.user_id, now).await?;
        let client = self.client_repo.find(quote.user_id, quote.client_id).await?;
        let items = self.quote_repo.items(quote.id).await?;
        let payment = if kind == DocumentKind::Receipt {
            self.payment_repo.find_by_quote(quote.id).await?
        } else {
            None
        };
        let watermark = plan_service::watermark(&owner, &self.policy, now);

        Ok(build_document(DocumentParts {
            kind,
            quote: &quote,
            items: &items,
            owner: &owner,
            client: client.as_ref(),
            payment: payment.as_ref(),
            watermark,
            issue_date: now.date_naive(),
        }))
    }

    /// Applies a client decision coming from the public page.
    async fn answer_public(&self, token: Uuid, next: QuoteStatus, reason: Option<String>) -> Result<Quote, ServiceError> {
        let now = Utc::now();
        let mut quote = self.public_quote(token).await?;
        if quote.status != QuoteStatus::Pending {
            return Err(illegal_transition(quote.status, next));
        }
        if quote.is_expired(now.date_naive()) {
            return Err(ServiceError::Conflict("Quote validity has expired".to_string()));
        }

        match next {
            QuoteStatus::Approved => quote.approved_at = Some(now),
            _ => {
                quote.rejected_at = Some(now);
                quote.rejection_reason = reason;
            }
        }
        quote.status = next;

        let updated = self
            .quote_repo
            .transition(&quote, QuoteStatus::Pending)
            .await?
            .ok_or_else(|| ServiceError::Conflict("Quote was already answered".to_string()))?;

        let (kind, title, message) = if next == QuoteStatus::Approved {
            (
                NotificationKind::QuoteApproved,
                "Orçamento aprovado",
                format!("O orçamento {} ({}) foi aprovado.", updated.number_label(), updated.title),
            )
        } else {
            (
                NotificationKind::QuoteRejected,
                "Orçamento recusado",
                format!("O orçamento {} ({}) foi recusado.", updated.number_label(), updated.title),
            )
        };
        self.notifications
            .notify(updated.user_id, kind, title.to_string(), message, Some(updated.id))
            .await;
        Ok(updated)
    }

    async fn email_client(&self, quote: &Quote) {
        let Some(mailer) = self.mailer.as_ref() else {
            info!("SMTP not configured, skipping quote email");
            return;
        };
        let client = match self.client_repo.find(quote.user_id, quote.client_id).await {
            Ok(Some(client)) => client,
            Ok(None) => return,
            Err(e) => {
                warn!("Could not load client for quote email: {e}");
                return;
            }
        };
        let Some(to) = client.email.clone() else {
            info!("Client has no email, skipping quote email");
            return;
        };
        let provider_name = match self.user_repo.find_by_id(quote.user_id).await {
            Ok(Some(user)) => user.display_name().to_string(),
            _ => "Fechou!".to_string(),
        };

        let email = QuoteEmail {
            to,
            client_name: client.name,
            provider_name,
            quote_label: quote.number_label(),
            quote_title: quote.title.clone(),
            total: format_brl(quote.total_cents),
            link: public_quote_url(&self.public_app_url, &quote.public_token),
        };
        match mailer.send_quote(email).await {
            Ok(()) => info!("Quote email sent"),
            Err(e) => warn!("Failed to send quote email: {e}"),
        }
    }
}

#[async_trait]
impl QuoteService for QuoteServiceImpl {
    #[instrument(skip(self, request), fields(client_id = %request.client_id))]
    async fn create_quote(&self, user_id: Uuid, request: QuoteRequest) -> Result<QuoteWithItems, ServiceError> {
        info!("Creating quote");
        self.owned_client(user_id, request.client_id).await?;

        let quote_id = Uuid::new_v4();
        let (items, subtotal) = build_items(quote_id, &request.items)?;
        let discount = request.discount_cents.unwrap_or(0);
        let total = quote_total(subtotal, discount)?;

        let now = Utc::now();
        let draft = Quote {
            id: quote_id,
            user_id,
            client_id: request.client_id,
            number: 0,
            title: request.title.trim().to_string(),
            description: non_blank(request.description),
            status: QuoteStatus::Draft,
            subtotal_cents: subtotal,
            discount_cents: discount,
            total_cents: total,
            valid_until: request.valid_until,
            notes: non_blank(request.notes),
            payment_terms: non_blank(request.payment_terms),
            public_token: Uuid::new_v4(),
            sent_at: None,
            viewed_at: None,
            approved_at: None,
            rejected_at: None,
            rejection_reason: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store_new_quote(user_id, draft, items).await
    }

    #[instrument(skip(self))]
    async fn duplicate_quote(&self, user_id: Uuid, id: Uuid) -> Result<QuoteWithItems, ServiceError> {
        let source = self.owned_quote(user_id, id).await?;
        let source_items = self.quote_repo.items(source.id).await?;

        let now = Utc::now();
        let quote_id = Uuid::new_v4();
        let items = source_items
            .into_iter()
            .map(|item| QuoteItem { id: Uuid::new_v4(), quote_id, ..item })
            .collect();
        let draft = Quote {
            id: quote_id,
            number: 0,
            status: QuoteStatus::Draft,
            public_token: Uuid::new_v4(),
            sent_at: None,
            viewed_at: None,
            approved_at: None,
            rejected_at: None,
            rejection_reason: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
            ..source
        };
        self.store_new_quote(user_id, draft, items).await
    }

    #[instrument(skip(self))]
    async fn get_quote(&self, user_id: Uuid, id: Uuid) -> Result<QuoteWithItems, ServiceError> {
        let quote = self.owned_quote(user_id, id).await?;
        self.with_items(quote).await
    }

    #[instrument(skip(self))]
    async fn list_quotes(&self, user_id: Uuid, query: QuoteListQuery) -> Result<PaginatedResponse<Quote>, ServiceError> {
        let status = match non_blank(query.status) {
            Some(raw) => Some(raw.parse::<QuoteStatus>().map_err(ServiceError::InvalidInput)?),
            None => None,
        };
        let filter = QuoteFilter { status, client_id: query.client_id };
        let paging = PaginationQuery { page: query.page, limit: query.limit };
        let (page, limit) = (paging.page(), paging.limit());

        let items = self.quote_repo.list(user_id, &filter, page, limit).await?;
        let total = self.quote_repo.count(user_id, &filter).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, request))]
    async fn update_quote(&self, user_id: Uuid, id: Uuid, request: QuoteRequest) -> Result<QuoteWithItems, ServiceError> {
        let mut quote = self.owned_quote(user_id, id).await?;
        if !quote.status.is_editable() {
            return Err(ServiceError::Conflict(format!("A {} quote can no longer be edited", quote.status)));
        }
        if quote.client_id != request.client_id {
            self.owned_client(user_id, request.client_id).await?;
        }

        let (items, subtotal) = build_items(quote.id, &request.items)?;
        let discount = request.discount_cents.unwrap_or(0);
        let total = quote_total(subtotal, discount)?;

        quote.client_id = request.client_id;
        quote.title = request.title.trim().to_string();
        quote.description = non_blank(request.description);
        quote.subtotal_cents = subtotal;
        quote.discount_cents = discount;
        quote.total_cents = total;
        quote.valid_until = request.valid_until;
        quote.notes = non_blank(request.notes);
        quote.payment_terms = non_blank(request.payment_terms);

        let updated = self.quote_repo.replace(&quote, items).await;
        match &updated {
            Ok(_) => info!("Quote updated"),
            Err(e) => error!("Failed to update quote: {e}"),
        }
        Ok(updated?)
    }

    #[instrument(skip(self))]
    async fn delete_quote(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let quote = self.owned_quote(user_id, id).await?;
        if quote.status == QuoteStatus::Paid {
            return Err(ServiceError::Conflict("Paid quotes cannot be deleted".to_string()));
        }
        self.quote_repo.delete(user_id, id).await?;
        info!("Quote deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn send_quote(&self, user_id: Uuid, id: Uuid) -> Result<Quote, ServiceError> {
        let mut quote = self.owned_quote(user_id, id).await?;
        if !quote.status.can_transition_to(QuoteStatus::Pending) {
            return Err(illegal_transition(quote.status, QuoteStatus::Pending));
        }
        quote.status = QuoteStatus::Pending;
        quote.sent_at = Some(Utc::now());

        let sent = self
            .quote_repo
            .transition(&quote, QuoteStatus::Draft)
            .await?
            .ok_or_else(|| ServiceError::Conflict("Quote was already sent".to_string()))?;
        info!("Quote sent");
        self.email_client(&sent).await;
        Ok(sent)
    }

    #[instrument(skip(self, request), fields(to = %request.status))]
    async fn update_status(&self, user_id: Uuid, id: Uuid, request: UpdateStatusRequest) -> Result<Quote, ServiceError> {
        let mut quote = self.owned_quote(user_id, id).await?;
        let from = quote.status;
        let next = request.status;
        // Sending and payment have their own endpoints.
        if !matches!(next, QuoteStatus::Approved | QuoteStatus::Rejected) || !from.can_transition_to(next) {
            return Err(illegal_transition(from, next));
        }

        let now = Utc::now();
        if next == QuoteStatus::Approved {
            quote.approved_at = Some(now);
        } else {
            quote.rejected_at = Some(now);
            quote.rejection_reason = non_blank(request.reason);
        }
        quote.status = next;

        let updated = self
            .quote_repo
            .transition(&quote, from)
            .await?
            .ok_or_else(|| ServiceError::Conflict("Quote status changed in the meantime".to_string()))?;
        info!("Quote status updated");
        Ok(updated)
    }

    #[instrument(skip(self, request), fields(method = ?request.method))]
    async fn register_payment(&self, user_id: Uuid, id: Uuid, request: PaymentRequest) -> Result<Quote, ServiceError> {
        let quote = self.owned_quote(user_id, id).await?;
        if !quote.status.can_transition_to(QuoteStatus::Paid) {
            return Err(illegal_transition(quote.status, QuoteStatus::Paid));
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            quote_id: quote.id,
            user_id,
            amount_cents: quote.total_cents,
            method: request.method,
            paid_at: request.paid_at.unwrap_or(now),
            notes: non_blank(request.notes),
            created_at: now,
        };
        let paid = self
            .quote_repo
            .record_payment(&quote, &payment)
            .await?
            .ok_or_else(|| ServiceError::Conflict("Quote is no longer awaiting payment".to_string()))?;

        self.notifications
            .notify(
                user_id,
                NotificationKind::QuotePaid,
                "Pagamento registrado".to_string(),
                format!(
                    "Pagamento de {} registrado para o orçamento {}.",
                    format_brl(payment.amount_cents),
                    paid.number_label()
                ),
                Some(paid.id),
            )
            .await;
        Ok(paid)
    }

    #[instrument(skip(self))]
    async fn document(&self, user_id: Uuid, id: Uuid) -> Result<QuoteDocument, ServiceError> {
        let quote = self.owned_quote(user_id, id).await?;
        let kind = if quote.status == QuoteStatus::Paid { DocumentKind::Receipt } else { DocumentKind::Quote };
        self.render(kind, quote, Utc::now()).await
    }

    #[instrument(skip(self, token))]
    async fn view_public(&self, token: Uuid) -> Result<PublicQuoteResponse, ServiceError> {
        let now = Utc::now();
        let mut quote = self.public_quote(token).await?;

        if quote.status == QuoteStatus::Pending && quote.viewed_at.is_none() {
            if let Some(viewed) = self.quote_repo.mark_viewed(quote.id, now).await? {
                info!(quote_id = %viewed.id, "Quote viewed for the first time");
                self.notifications
                    .notify(
                        viewed.user_id,
                        NotificationKind::QuoteViewed,
                        "Orçamento visualizado".to_string(),
                        format!("Seu cliente abriu o orçamento {} ({}).", viewed.number_label(), viewed.title),
                        Some(viewed.id),
                    )
                    .await;
                quote = viewed;
            }
        }

        let owner: User = load_user(self.user_repo.as_ref(), quote.user_id, now).await?;
        let client = self.client_repo.find(quote.user_id, quote.client_id).await?;
        let review = self.review_repo.find_by_quote(quote.id).await?;
        let expired = quote.is_expired(now.date_naive());
        let can_respond = quote.status == QuoteStatus::Pending && !expired;

        let number_label = quote.number_label();
        let quote = self.with_items(quote).await?;
        Ok(PublicQuoteResponse {
            quote,
            number_label,
            provider: provider_block(&owner),
            client: client.as_ref().map(client_block).unwrap_or_default(),
            expired,
            can_respond,
            review,
        })
    }

    #[instrument(skip(self, token))]
    async fn public_document(&self, token: Uuid) -> Result<QuoteDocument, ServiceError> {
        let quote = self.public_quote(token).await?;
        self.render(DocumentKind::Quote, quote, Utc::now()).await
    }

    #[instrument(skip(self, token))]
    async fn approve_public(&self, token: Uuid) -> Result<Quote, ServiceError> {
        self.answer_public(token, QuoteStatus::Approved, None).await
    }

    #[instrument(skip(self, token, request))]
    async fn reject_public(&self, token: Uuid, request: RejectRequest) -> Result<Quote, ServiceError> {
        self.answer_public(token, QuoteStatus::Rejected, non_blank(request.reason)).await
    }

    #[instrument(skip(self, token))]
    async fn receipt(&self, token: Uuid) -> Result<QuoteDocument, ServiceError> {
        let quote = self.public_quote(token).await?;
        if quote.status != QuoteStatus::Paid {
            return Err(ServiceError::NotFound("Receipt is only available for paid quotes".to_string()));
        }
        self.render(DocumentKind::Receipt, quote, Utc::now()).await
    }
}
