//! Pure authorization decisions. Nothing here performs I/O or caches a
//! result; callers evaluate a fresh decision for every request.

use crate::identity::{Principal, Role};
use crate::models::parcel::Parcel;

pub fn can_read(principal: Option<&Principal>, parcel: &Parcel) -> bool {
    let Some(principal) = principal else {
        return false;
    };

    match principal.role {
        Role::Admin | Role::Staff => true,
        Role::Customer => is_sender(principal, parcel) || is_receiver(principal, parcel),
    }
}

/// Customers never mutate status; booking is creation and not checked here.
pub fn can_write(principal: &Principal, _parcel: &Parcel) -> bool {
    has_write_role(principal)
}

/// Role gate shared by every status write, evaluated before any input is parsed.
pub fn has_write_role(principal: &Principal) -> bool {
    matches!(principal.role, Role::Admin | Role::Staff)
}

pub fn can_list_all(principal: &Principal) -> bool {
    principal.role == Role::Admin
}

/// Whether the parcel belongs in the principal's privileged listings.
/// Staff see parcels picked up in or delivered to their region.
pub fn in_operational_scope(principal: &Principal, parcel: &Parcel) -> bool {
    match principal.role {
        Role::Admin => true,
        Role::Staff => principal.region.as_deref().is_some_and(|region| {
            let region = region.trim();
            !region.is_empty()
                && (parcel.pickup.region.trim().eq_ignore_ascii_case(region)
                    || parcel.delivery.region.trim().eq_ignore_ascii_case(region))
        }),
        Role::Customer => false,
    }
}

pub fn can_list_privileged(principal: &Principal) -> bool {
    matches!(principal.role, Role::Admin | Role::Staff)
}

pub fn is_sender(principal: &Principal, parcel: &Parcel) -> bool {
    parcel.sender.user_id == principal.user_id
}

pub fn is_receiver(principal: &Principal, parcel: &Parcel) -> bool {
    if !parcel.receiver_self_service {
        return false;
    }

    let receiver_keys = parcel.receiver.contact_keys();
    principal
        .contact_keys()
        .iter()
        .any(|key| receiver_keys.contains(key))
}
