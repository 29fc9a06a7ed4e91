use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{BinPage, BinStore, BinWindow, NotificationStore, StoreError, StoreResult};
use crate::model::{
    Bin, BinUpdate, FieldOfficer, NewBin, NewNotification, Notification, NotificationWithBin,
    TelemetryWrite,
};

/// Process-local store for tests and `BIN_STORE=memory` development runs.
/// Each operation holds the relevant lock for its whole duration, which gives
/// the same per-record atomicity the Postgres upsert provides.
#[derive(Default)]
pub struct MemoryStore {
    bins: RwLock<HashMap<String, Bin>>,
    officers: RwLock<HashMap<String, FieldOfficer>>,
    notifications: RwLock<Vec<Notification>>,
    fail_bin_writes: AtomicBool,
    fail_notification_writes: AtomicBool,
    writes: AtomicUsize,
}

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
}

fn newest_first(bins: &mut [Bin]) {
    bins.sort_by(|a, b| {
        b.last_updated
            .cmp(&a.last_updated)
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_officer(&self, officer: FieldOfficer) -> StoreResult<()> {
        write(&self.officers)?.insert(officer.id.clone(), officer);
        Ok(())
    }

    /// Make every bin write fail until switched off again.
    pub fn fail_bin_writes(&self, fail: bool) {
        self.fail_bin_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every notification insert fail until switched off again.
    pub fn fail_notification_writes(&self, fail: bool) {
        self.fail_notification_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful mutating calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn bin_count(&self) -> StoreResult<usize> {
        Ok(read(&self.bins)?.len())
    }

    pub fn notifications_for(&self, bin_id: &str) -> StoreResult<Vec<Notification>> {
        Ok(read(&self.notifications)?
            .iter()
            .filter(|n| n.bin_id == bin_id)
            .cloned()
            .collect())
    }

    fn check_bin_writes(&self) -> StoreResult<()> {
        if self.fail_bin_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected bin write failure".into()));
        }
        Ok(())
    }

    fn sorted_bins(&self, keep: impl Fn(&Bin) -> bool) -> StoreResult<Vec<Bin>> {
        let mut bins: Vec<Bin> = read(&self.bins)?.values().filter(|b| keep(b)).cloned().collect();
        newest_first(&mut bins);
        Ok(bins)
    }

    /// Notifications newest first; among equal timestamps the later insert wins.
    fn sorted_notifications(&self, keep: impl Fn(&Notification) -> bool) -> StoreResult<Vec<Notification>> {
        let mut items: Vec<Notification> = read(&self.notifications)?
            .iter()
            .rev()
            .filter(|n| keep(n))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BinStore for MemoryStore {
    async fn upsert_telemetry(&self, telemetry: &TelemetryWrite) -> StoreResult<Bin> {
        self.check_bin_writes()?;
        let mut bins = write(&self.bins)?;
        let bin = bins
            .entry(telemetry.id.clone())
            .and_modify(|bin| {
                bin.name = telemetry.name.clone();
                bin.location = telemetry.location.clone();
                bin.fill_level = telemetry.fill_level;
                bin.status = telemetry.status;
                bin.last_updated = telemetry.reported_at;
            })
            .or_insert_with(|| telemetry.seed().into_bin(telemetry.reported_at))
            .clone();
        self.record_write();
        Ok(bin)
    }

    async fn insert_bin(&self, new_bin: &NewBin) -> StoreResult<Bin> {
        self.check_bin_writes()?;
        let mut bins = write(&self.bins)?;
        if bins.contains_key(&new_bin.id) {
            return Err(StoreError::Conflict(new_bin.id.clone()));
        }
        let bin = new_bin.clone().into_bin(Utc::now());
        bins.insert(bin.id.clone(), bin.clone());
        self.record_write();
        Ok(bin)
    }

    async fn update_bin(&self, id: &str, update: &BinUpdate) -> StoreResult<Option<Bin>> {
        self.check_bin_writes()?;
        let mut bins = write(&self.bins)?;
        let Some(bin) = bins.get_mut(id) else {
            return Ok(None);
        };
        update.apply_to(bin, Utc::now());
        self.record_write();
        Ok(Some(bin.clone()))
    }

    async fn fetch_bin(&self, id: &str) -> StoreResult<Option<Bin>> {
        Ok(read(&self.bins)?.get(id).cloned())
    }

    async fn list_bins(&self, window: &BinWindow) -> StoreResult<BinPage> {
        let matching = self.sorted_bins(|bin| window.status.map_or(true, |s| bin.status == s))?;
        let total = matching.len() as u64;
        let bins = matching
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect();
        Ok(BinPage { bins, total })
    }

    async fn bins_with_coordinates(&self) -> StoreResult<Vec<Bin>> {
        self.sorted_bins(|bin| bin.coordinates().is_some())
    }

    async fn all_bins(&self) -> StoreResult<Vec<Bin>> {
        self.sorted_bins(|_| true)
    }

    async fn fetch_officer(&self, id: &str) -> StoreResult<Option<FieldOfficer>> {
        Ok(read(&self.officers)?.get(id).cloned())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: &NewNotification) -> StoreResult<Notification> {
        if self.fail_notification_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected notification write failure".into()));
        }
        let stored = notification.clone().into_notification(Uuid::new_v4(), Utc::now());
        write(&self.notifications)?.push(stored.clone());
        self.record_write();
        Ok(stored)
    }

    async fn recent_for_bin(&self, bin_id: &str, limit: u32) -> StoreResult<Vec<Notification>> {
        let mut items = self.sorted_notifications(|n| n.bin_id == bin_id)?;
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn list_notifications(
        &self,
        read_filter: Option<bool>,
        limit: u32,
    ) -> StoreResult<Vec<NotificationWithBin>> {
        let mut items = self.sorted_notifications(|n| read_filter.map_or(true, |r| n.read == r))?;
        items.truncate(limit as usize);
        let bins = read(&self.bins)?;
        Ok(items
            .into_iter()
            .map(|notification| {
                let bin = bins.get(&notification.bin_id).map(Bin::summary);
                NotificationWithBin { notification, bin }
            })
            .collect())
    }

    async fn unread_count(&self) -> StoreResult<u64> {
        Ok(read(&self.notifications)?.iter().filter(|n| !n.read).count() as u64)
    }

    async fn mark_read(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        let mut items = write(&self.notifications)?;
        let Some(item) = items.iter_mut().find(|n| n.id == id) else {
            return Ok(None);
        };
        item.read = true;
        self.record_write();
        Ok(Some(item.clone()))
    }

    async fn mark_all_read(&self) -> StoreResult<u64> {
        let mut items = write(&self.notifications)?;
        let mut flipped = 0;
        for item in items.iter_mut().filter(|n| !n.read) {
            item.read = true;
            flipped += 1;
        }
        self.record_write();
        Ok(flipped)
    }

    async fn delete_notification(&self, id: Uuid) -> StoreResult<bool> {
        let mut items = write(&self.notifications)?;
        let before = items.len();
        items.retain(|n| n.id != id);
        let removed = items.len() != before;
        if removed {
            self.record_write();
        }
        Ok(removed)
    }
}
