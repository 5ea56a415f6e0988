use chrono::NaiveDate;

use crate::dto::document_dto::{DocumentKind, DocumentLine, PartyBlock, PaymentBlock, QuoteDocument};
use crate::model::client::Client;
use crate::model::payment::Payment;
use crate::model::quote::{Quote, QuoteItem};
use crate::model::user::User;
use crate::util::money::{format_brl, format_quantity};

fn join_address(parts: &[Option<&str>]) -> Option<String> {
    let parts: Vec<&str> = parts
        .iter()
        .flatten()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

pub fn provider_block(user: &User) -> PartyBlock {
    PartyBlock {
        name: user.display_name().to_string(),
        document: user.document.clone(),
        phone: user.phone.clone(),
        email: Some(user.email.clone()),
        address: join_address(&[
            user.address.as_deref(),
            user.city.as_deref(),
            user.state.as_deref(),
            user.zip_code.as_deref(),
        ]),
    }
}

pub fn client_block(client: &Client) -> PartyBlock {
    PartyBlock {
        name: client.name.clone(),
        document: client.document.clone(),
        phone: client.phone.clone(),
        email: client.email.clone(),
        address: join_address(&[
            client.address.as_deref(),
            client.city.as_deref(),
            client.state.as_deref(),
            client.zip_code.as_deref(),
        ]),
    }
}

pub fn document_line(item: &QuoteItem) -> DocumentLine {
    DocumentLine {
        position: item.position,
        description: item.description.clone(),
        quantity: item.quantity,
        quantity_label: format_quantity(item.quantity),
        unit_price_cents: item.unit_price_cents,
        unit_price: format_brl(item.unit_price_cents),
        total_cents: item.total_cents,
        total: format_brl(item.total_cents),
    }
}

pub struct DocumentParts<'a> {
    pub kind: DocumentKind,
    pub quote: &'a Quote,
    pub items: &'a [QuoteItem],
    pub owner: &'a User,
    pub client: Option<&'a Client>,
    pub payment: Option<&'a Payment>,
    pub watermark: Option<String>,
    pub issue_date: NaiveDate,
}

pub fn build_document(parts: DocumentParts<'_>) -> QuoteDocument {
    let quote = parts.quote;
    let mut items: Vec<&QuoteItem> = parts.items.iter().collect();
    items.sort_by_key(|i| i.position);

    QuoteDocument {
        kind: parts.kind,
        number_label: quote.number_label(),
        title: quote.title.clone(),
        description: quote.description.clone(),
        status: quote.status,
        issue_date: parts.issue_date,
        valid_until: quote.valid_until,
        provider: provider_block(parts.owner),
        client: parts.client.map(client_block).unwrap_or_default(),
        lines: items.into_iter().map(document_line).collect(),
        subtotal_cents: quote.subtotal_cents,
        subtotal: format_brl(quote.subtotal_cents),
        discount_cents: quote.discount_cents,
        discount: format_brl(quote.discount_cents),
        total_cents: quote.total_cents,
        total: format_brl(quote.total_cents),
        notes: quote.notes.clone(),
        payment_terms: quote.payment_terms.clone(),
        payment: parts.payment.map(|p| PaymentBlock {
            method: p.method,
            method_label: p.method.label().to_string(),
            amount_cents: p.amount_cents,
            amount: format_brl(p.amount_cents),
            paid_at: p.paid_at,
            notes: p.notes.clone(),
        }),
        watermark: parts.watermark,
    }
}
