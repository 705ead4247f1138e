//! Default-selection invariant engine.
//!
//! A user's payment methods (and additional shipping addresses) carry at most
//! one default. The functions here are pure: they look at a snapshot of the
//! user's items and return a plan describing which flags to flip. Stores load
//! the snapshot and apply the plan inside the same transaction, so the clear
//! and set steps are never observed separately.
//!
//! # Invariant
//!
//! After applying any plan, at most one slot has `is_default = true`. Under
//! [`SelectionPolicy::PAYMENT_METHODS`], a non-empty collection has exactly one.

use chrono::{DateTime, Utc};

/// The selection-relevant view of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<Id> {
    pub id: Id,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// What happens when the default item is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDefaultRemoved {
    /// Promote the most recently created remaining item (ties: highest id).
    PromoteMostRecent,
    /// Leave the collection without a default.
    Clear,
}

/// Per-collection rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// The first item added to an empty collection becomes the default.
    pub promote_first: bool,
    pub on_default_removed: OnDefaultRemoved,
}

impl SelectionPolicy {
    /// Payment methods always self-heal to exactly one default.
    pub const PAYMENT_METHODS: Self = Self {
        promote_first: true,
        on_default_removed: OnDefaultRemoved::PromoteMostRecent,
    };

    /// The default shipping address is a weak reference that is dropped with its target.
    pub const SHIPPING_ADDRESSES: Self = Self {
        promote_first: false,
        on_default_removed: OnDefaultRemoved::Clear,
    };
}

/// The referenced item does not exist in the caller's collection.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("item not found in this user's collection")]
pub struct NotInCollection;

/// Plan for inserting a new item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPlan<Id> {
    /// Existing items that lose their default flag.
    pub clear: Vec<Id>,
    /// Resolved default flag for the new item.
    pub new_is_default: bool,
}

/// Plan for re-selecting the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDefaultPlan<Id> {
    pub clear: Vec<Id>,
    pub set: Id,
}

/// Plan for removing an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovePlan<Id> {
    pub remove: Id,
    pub was_default: bool,
    /// Item that becomes the new default, if any.
    pub promote: Option<Id>,
}

/// Resolve the default flag for a new item and the flags to clear beforehand.
#[must_use]
pub fn plan_add<Id: Copy>(
    policy: SelectionPolicy,
    existing: &[Slot<Id>],
    requested_default: bool,
) -> AddPlan<Id> {
    let forced = policy.promote_first && existing.is_empty();
    let new_is_default = forced || requested_default;

    let clear = if new_is_default {
        current_defaults(existing)
    } else {
        Vec::new()
    };

    AddPlan {
        clear,
        new_is_default,
    }
}

/// Make `target` the only default.
///
/// # Errors
///
/// Returns [`NotInCollection`] if `target` is not in `existing`.
pub fn plan_set_default<Id: Copy + Eq>(
    existing: &[Slot<Id>],
    target: Id,
) -> Result<SetDefaultPlan<Id>, NotInCollection> {
    if !existing.iter().any(|s| s.id == target) {
        return Err(NotInCollection);
    }

    let clear = existing
        .iter()
        .filter(|s| s.is_default && s.id != target)
        .map(|s| s.id)
        .collect();

    Ok(SetDefaultPlan { clear, set: target })
}

/// Remove `target`, choosing a replacement default when required.
///
/// # Errors
///
/// Returns [`NotInCollection`] if `target` is not in `existing`.
pub fn plan_remove<Id: Copy + Ord>(
    policy: SelectionPolicy,
    existing: &[Slot<Id>],
    target: Id,
) -> Result<RemovePlan<Id>, NotInCollection> {
    let removed = existing
        .iter()
        .find(|s| s.id == target)
        .ok_or(NotInCollection)?;

    let promote = match (removed.is_default, policy.on_default_removed) {
        (true, OnDefaultRemoved::PromoteMostRecent) => existing
            .iter()
            .filter(|s| s.id != target)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .map(|s| s.id),
        _ => None,
    };

    Ok(RemovePlan {
        remove: target,
        was_default: removed.is_default,
        promote,
    })
}

/// Number of slots flagged default.
#[must_use]
pub fn default_count<Id>(slots: &[Slot<Id>]) -> usize {
    slots.iter().filter(|s| s.is_default).count()
}

/// Check the invariant for a collection under `policy`.
#[must_use]
pub fn holds<Id>(policy: SelectionPolicy, slots: &[Slot<Id>]) -> bool {
    let defaults = default_count(slots);
    let heals = policy.promote_first
        && policy.on_default_removed == OnDefaultRemoved::PromoteMostRecent;
    if heals && !slots.is_empty() {
        defaults == 1
    } else {
        defaults <= 1
    }
}

fn current_defaults<Id: Copy>(existing: &[Slot<Id>]) -> Vec<Id> {
    existing
        .iter()
        .filter(|s| s.is_default)
        .map(|s| s.id)
        .collect()
}

/// Items that can be updated in place by applying a plan.
///
/// Implemented by in-memory collections; SQL stores translate plans into
/// `UPDATE` statements instead.
pub trait Selectable {
    type Id: Copy + Eq;

    fn slot(&self) -> Slot<Self::Id>;
    fn set_default(&mut self, is_default: bool);
}

/// Snapshot slots from a slice of items.
#[must_use]
pub fn slots_of<T: Selectable>(items: &[T]) -> Vec<Slot<T::Id>> {
    items.iter().map(Selectable::slot).collect()
}

/// Clear the default flag on every item listed in `ids`.
pub fn clear_defaults<T: Selectable>(items: &mut [T], ids: &[T::Id]) {
    for item in items.iter_mut() {
        if ids.contains(&item.slot().id) {
            item.set_default(false);
        }
    }
}

/// Set the default flag on the item with `id`.
pub fn mark_default<T: Selectable>(items: &mut [T], id: T::Id) {
    if let Some(item) = items.iter_mut().find(|i| i.slot().id == id) {
        item.set_default(true);
    }
}
