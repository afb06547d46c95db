use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::AssemblyError;
use crate::models::proxy::{NewProxy, Proxy, ProxyDraft, ProxyType, ProxyValidation};
use crate::store::VotingStore;
use crate::validation::{MAX_NAME_LEN, MAX_REFERENCE_LEN, optional_text, required_text};

/// Time-bounded delegations from a unit's owner to a proxy.
///
/// Activity is a query-time window check; historical proxies are never
/// removed so attendance and ballots can still be audited against them.
#[derive(Clone)]
pub struct ProxyRegistry {
    store: Arc<dyn VotingStore>,
}

impl ProxyRegistry {
    pub fn new(store: Arc<dyn VotingStore>) -> Self {
        Self { store }
    }

    pub async fn create_proxy(&self, request: NewProxy) -> Result<Proxy, AssemblyError> {
        self.create_proxy_at(request, Utc::now()).await
    }

    pub async fn create_proxy_at(
        &self,
        request: NewProxy,
        now: DateTime<Utc>,
    ) -> Result<Proxy, AssemblyError> {
        let delegate_name = required_text(&request.delegate_name, MAX_NAME_LEN, "delegate_name")?;
        let proxy_type = ProxyType::parse(&request.proxy_type).ok_or_else(|| {
            AssemblyError::validation(format!("unsupported proxy type {}", request.proxy_type))
        })?;
        if request.start_date >= request.end_date {
            return Err(AssemblyError::validation(
                "proxy start_date must be before end_date",
            ));
        }

        let unit = self
            .store
            .property_unit(request.property_unit_id)
            .await?
            .ok_or_else(|| AssemblyError::not_found("property unit", request.property_unit_id))?;

        let overlapping = self
            .store
            .proxies_for_unit(unit.id)
            .await?
            .into_iter()
            .find(|existing| {
                existing.is_active && existing.overlaps(request.start_date, request.end_date)
            });
        if let Some(existing) = overlapping {
            return Err(AssemblyError::Conflict(format!(
                "property unit {} already has active proxy {} between {} and {}",
                unit.id, existing.id, existing.start_date, existing.end_date
            )));
        }

        let delegate_document_number = optional_text(
            request.delegate_document_number,
            MAX_NAME_LEN,
            "delegate_document_number",
        )?
        .unwrap_or_else(|| synthesize_document_number(unit.id, now));

        let draft = ProxyDraft {
            property_unit_id: unit.id,
            delegate_name,
            delegate_document_type: optional_text(
                request.delegate_document_type,
                MAX_NAME_LEN,
                "delegate_document_type",
            )?,
            delegate_document_number,
            delegate_email: optional_text(request.delegate_email, MAX_NAME_LEN, "delegate_email")?,
            delegate_phone: optional_text(request.delegate_phone, MAX_NAME_LEN, "delegate_phone")?,
            proxy_type,
            start_date: request.start_date,
            end_date: request.end_date,
            power_of_attorney_ref: optional_text(
                request.power_of_attorney_ref,
                MAX_REFERENCE_LEN,
                "power_of_attorney_ref",
            )?,
            created_at: now,
        };

        let proxy = self.store.insert_proxy(draft).await?;
        info!(
            proxy_id = proxy.id,
            property_unit_id = proxy.property_unit_id,
            proxy_type = proxy.proxy_type.as_str(),
            "proxy registered"
        );
        Ok(proxy)
    }

    pub async fn proxy(&self, proxy_id: i64) -> Result<Proxy, AssemblyError> {
        self.store
            .proxy(proxy_id)
            .await?
            .ok_or_else(|| AssemblyError::not_found("proxy", proxy_id))
    }

    pub async fn proxies_for_unit(&self, property_unit_id: i64) -> Result<Vec<Proxy>, AssemblyError> {
        Ok(self.store.proxies_for_unit(property_unit_id).await?)
    }

    pub async fn active_proxies(&self, property_unit_id: i64) -> Result<Vec<Proxy>, AssemblyError> {
        self.active_proxies_at(property_unit_id, Utc::now()).await
    }

    pub async fn active_proxies_at(
        &self,
        property_unit_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<Proxy>, AssemblyError> {
        let proxies = self.store.proxies_for_unit(property_unit_id).await?;
        Ok(proxies
            .into_iter()
            .filter(|proxy| proxy.is_active_at(at))
            .collect())
    }

    pub async fn validate_proxy(
        &self,
        proxy_id: i64,
        property_unit_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ProxyValidation, AssemblyError> {
        let proxy = self.proxy(proxy_id).await?;
        let reason = rejection_reason(&proxy, property_unit_id, at);
        Ok(ProxyValidation {
            proxy_id,
            property_unit_id,
            valid: reason.is_none(),
            reason,
            checked_at: at,
        })
    }

    /// Resolves the proxy acting for `property_unit_id` at `at`: the given
    /// one when supplied, otherwise the unit's active proxy.
    pub async fn require_active_proxy(
        &self,
        proxy_id: Option<i64>,
        property_unit_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Proxy, AssemblyError> {
        match proxy_id {
            Some(id) => {
                let proxy = self.proxy(id).await?;
                match rejection_reason(&proxy, property_unit_id, at) {
                    Some(reason) => Err(AssemblyError::Validation(reason)),
                    None => Ok(proxy),
                }
            }
            None => self
                .active_proxies_at(property_unit_id, at)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    AssemblyError::validation(format!(
                        "property unit {property_unit_id} has no active proxy"
                    ))
                }),
        }
    }

    pub async fn revoke_proxy(&self, proxy_id: i64) -> Result<Proxy, AssemblyError> {
        let proxy = self
            .store
            .set_proxy_active(proxy_id, false)
            .await?
            .ok_or_else(|| AssemblyError::not_found("proxy", proxy_id))?;
        info!(proxy_id, property_unit_id = proxy.property_unit_id, "proxy revoked");
        Ok(proxy)
    }
}

fn rejection_reason(proxy: &Proxy, property_unit_id: i64, at: DateTime<Utc>) -> Option<String> {
    if proxy.property_unit_id != property_unit_id {
        return Some(format!(
            "proxy {} does not represent property unit {property_unit_id}",
            proxy.id
        ));
    }
    if !proxy.is_active {
        return Some(format!("proxy {} has been revoked", proxy.id));
    }
    if at < proxy.start_date {
        return Some(format!(
            "proxy {} is not active until {}",
            proxy.id, proxy.start_date
        ));
    }
    if at > proxy.end_date {
        return Some(format!("proxy {} expired at {}", proxy.id, proxy.end_date));
    }
    None
}

fn synthesize_document_number(property_unit_id: i64, now: DateTime<Utc>) -> String {
    format!("PX-{property_unit_id}-{}", now.format("%Y%m%d%H%M%S"))
}
