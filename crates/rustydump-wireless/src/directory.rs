//! Entity directory
//!
//! Three insertion-ordered tables keyed by MAC. A MAC lives in at most one
//! of them: creating an AP evicts the same MAC from the station and
//! unidentified tables, creating a station evicts it from the unidentified
//! table, and neither stations nor unidentified nodes are created for a MAC
//! already known as an AP.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::entities::{AccessPoint, Station, UnidentifiedNode};
use crate::frames::MacAddress;
use crate::traffic::elapsed;

/// Insertion-ordered map from MAC to entity.
#[derive(Debug, Clone)]
pub struct Table<T> {
    entries: BTreeMap<u64, (MacAddress, T)>,
    index: HashMap<MacAddress, u64>,
    next_seq: u64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> Table<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.index.contains_key(mac)
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&T> {
        let seq = self.index.get(mac)?;
        self.entries.get(seq).map(|(_, entity)| entity)
    }

    pub fn get_mut(&mut self, mac: &MacAddress) -> Option<&mut T> {
        let seq = self.index.get(mac)?;
        self.entries.get_mut(seq).map(|(_, entity)| entity)
    }

    /// Existing entry, or a new one appended at the end.
    pub fn get_or_insert_with(&mut self, mac: MacAddress, make: impl FnOnce() -> T) -> (&mut T, bool) {
        let (seq, created) = match self.index.get(&mac) {
            Some(&seq) => (seq, false),
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.index.insert(mac, seq);
                self.entries.insert(seq, (mac, make()));
                (seq, true)
            }
        };
        let (_, entity) = self
            .entries
            .get_mut(&seq)
            .unwrap_or_else(|| unreachable!("index and entries are kept in step"));
        (entity, created)
    }

    pub fn remove(&mut self, mac: &MacAddress) -> Option<T> {
        let seq = self.index.remove(mac)?;
        self.entries.remove(&seq).map(|(_, entity)| entity)
    }

    /// Remove every entity for which `drop` holds; returns their MACs in
    /// insertion order.
    pub fn remove_where(&mut self, mut drop: impl FnMut(&T) -> bool) -> Vec<MacAddress> {
        let doomed: Vec<(u64, MacAddress)> = self
            .entries
            .iter()
            .filter(|(_, (_, entity))| drop(entity))
            .map(|(&seq, (mac, _))| (seq, *mac))
            .collect();
        for (seq, mac) in &doomed {
            self.entries.remove(seq);
            self.index.remove(mac);
        }
        doomed.into_iter().map(|(_, mac)| mac).collect()
    }

    /// Entities in insertion order; `.rev()` gives newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.entries.values().map(|(_, entity)| entity)
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut T> + '_ {
        self.entries.values_mut().map(|(_, entity)| entity)
    }

    pub fn macs(&self) -> impl DoubleEndedIterator<Item = MacAddress> + '_ {
        self.entries.values().map(|(mac, _)| *mac)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    AccessPoint,
    Station,
    Unidentified,
}

/// Mutable handle returned by [`Directory::lookup_or_create`].
#[derive(Debug)]
pub enum EntityMut<'a> {
    AccessPoint(&'a mut AccessPoint),
    Station(&'a mut Station),
    Unidentified(&'a mut UnidentifiedNode),
}

/// Entities removed by one purge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub access_points: Vec<MacAddress>,
    pub stations: Vec<MacAddress>,
    pub unidentified: Vec<MacAddress>,
}

impl PurgeReport {
    pub fn is_empty(&self) -> bool {
        self.access_points.is_empty() && self.stations.is_empty() && self.unidentified.is_empty()
    }

    pub fn total(&self) -> usize {
        self.access_points.len() + self.stations.len() + self.unidentified.len()
    }
}

/// Settings applied to newly created access points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryOptions {
    /// Allocate an IV set per AP
    pub record_ivs: bool,
    /// Arm decloak detection per AP
    pub decloak: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    options: DirectoryOptions,
    access_points: Table<AccessPoint>,
    stations: Table<Station>,
    unidentified: Table<UnidentifiedNode>,
}

impl Directory {
    pub fn new(options: DirectoryOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> DirectoryOptions {
        self.options
    }

    pub fn access_points(&self) -> &Table<AccessPoint> {
        &self.access_points
    }

    pub fn stations(&self) -> &Table<Station> {
        &self.stations
    }

    pub fn unidentified(&self) -> &Table<UnidentifiedNode> {
        &self.unidentified
    }

    pub fn ap(&self, bssid: &MacAddress) -> Option<&AccessPoint> {
        self.access_points.get(bssid)
    }

    pub fn ap_mut(&mut self, bssid: &MacAddress) -> Option<&mut AccessPoint> {
        self.access_points.get_mut(bssid)
    }

    pub fn station(&self, mac: &MacAddress) -> Option<&Station> {
        self.stations.get(mac)
    }

    pub fn station_mut(&mut self, mac: &MacAddress) -> Option<&mut Station> {
        self.stations.get_mut(mac)
    }

    pub fn node(&self, mac: &MacAddress) -> Option<&UnidentifiedNode> {
        self.unidentified.get(mac)
    }

    /// Which table holds `mac`, if any.
    pub fn kind_of(&self, mac: &MacAddress) -> Option<EntityKind> {
        if self.access_points.contains(mac) {
            Some(EntityKind::AccessPoint)
        } else if self.stations.contains(mac) {
            Some(EntityKind::Station)
        } else if self.unidentified.contains(mac) {
            Some(EntityKind::Unidentified)
        } else {
            None
        }
    }

    /// AP for `bssid`, created if unseen. Group addresses never become APs.
    pub fn ap_entry(&mut self, bssid: MacAddress, now: SystemTime) -> Option<(&mut AccessPoint, bool)> {
        if bssid.is_multicast() {
            return None;
        }
        if !self.access_points.contains(&bssid) {
            self.unidentified.remove(&bssid);
            if self.stations.remove(&bssid).is_some() {
                tracing::debug!(target: "wifi", mac = %bssid, "station_promoted_to_ap");
            }
        }
        let DirectoryOptions { record_ivs, decloak } = self.options;
        let (ap, created) = self
            .access_points
            .get_or_insert_with(bssid, || AccessPoint::new(bssid, now, record_ivs, decloak));
        if created {
            tracing::debug!(target: "wifi", bssid = %bssid, "access_point_created");
        }
        Some((ap, created))
    }

    /// Station for `mac`, created if unseen. Group addresses and known APs
    /// are refused.
    pub fn station_entry(&mut self, mac: MacAddress, now: SystemTime) -> Option<(&mut Station, bool)> {
        if mac.is_multicast() || self.access_points.contains(&mac) {
            return None;
        }
        if !self.stations.contains(&mac) {
            self.unidentified.remove(&mac);
        }
        let (station, created) = self.stations.get_or_insert_with(mac, || Station::new(mac, now));
        if created {
            tracing::debug!(target: "wifi", station = %mac, "station_created");
        }
        Some((station, created))
    }

    /// Unidentified node for `mac`, unless the MAC is a group address or
    /// already known as an AP or station.
    pub fn node_entry(&mut self, mac: MacAddress, now: SystemTime) -> Option<(&mut UnidentifiedNode, bool)> {
        if mac.is_multicast() || mac.is_zero() {
            return None;
        }
        if self.access_points.contains(&mac) || self.stations.contains(&mac) {
            return None;
        }
        Some(
            self.unidentified
                .get_or_insert_with(mac, || UnidentifiedNode::new(mac, now)),
        )
    }

    /// Generic lookup-or-create over the three tables.
    pub fn lookup_or_create(&mut self, kind: EntityKind, mac: MacAddress, now: SystemTime) -> Option<(EntityMut<'_>, bool)> {
        match kind {
            EntityKind::AccessPoint => self
                .ap_entry(mac, now)
                .map(|(ap, created)| (EntityMut::AccessPoint(ap), created)),
            EntityKind::Station => self
                .station_entry(mac, now)
                .map(|(sta, created)| (EntityMut::Station(sta), created)),
            EntityKind::Unidentified => self
                .node_entry(mac, now)
                .map(|(node, created)| (EntityMut::Unidentified(node), created)),
        }
    }

    /// AP and station at once, for updates touching both.
    pub fn pair_mut(
        &mut self,
        bssid: &MacAddress,
        station: Option<&MacAddress>,
    ) -> (Option<&mut AccessPoint>, Option<&mut Station>) {
        let station = match station {
            Some(mac) => self.stations.get_mut(mac),
            None => None,
        };
        (self.access_points.get_mut(bssid), station)
    }

    /// Remove an entity. Removing an AP also removes its stations.
    pub fn remove(&mut self, kind: EntityKind, mac: &MacAddress) -> bool {
        match kind {
            EntityKind::AccessPoint => self.remove_ap(mac).is_some(),
            EntityKind::Station => self.stations.remove(mac).is_some(),
            EntityKind::Unidentified => self.unidentified.remove(mac).is_some(),
        }
    }

    /// Remove an AP and every station referencing it; returns the removed
    /// station MACs.
    pub fn remove_ap(&mut self, bssid: &MacAddress) -> Option<Vec<MacAddress>> {
        self.access_points.remove(bssid)?;
        let bssid = *bssid;
        Some(self.stations.remove_where(|sta| sta.ap == Some(bssid)))
    }

    /// Remove every entity idle for more than `max_age`. Zero disables
    /// aging.
    pub fn purge_older_than(&mut self, now: SystemTime, max_age: Duration) -> PurgeReport {
        let mut report = PurgeReport::default();
        if max_age.is_zero() {
            return report;
        }
        let stale = |last_seen: SystemTime| elapsed(now, last_seen) > max_age;

        report.unidentified = self.unidentified.remove_where(|node| stale(node.last_seen));
        report.stations = self.stations.remove_where(|sta| stale(sta.last_seen));
        report.access_points = self.access_points.remove_where(|ap| stale(ap.last_seen));
        for bssid in &report.access_points {
            let bssid = *bssid;
            let orphans = self.stations.remove_where(|sta| sta.ap == Some(bssid));
            report.stations.extend(orphans);
        }

        if !report.is_empty() {
            tracing::debug!(
                target: "wifi",
                access_points = report.access_points.len(),
                stations = report.stations.len(),
                unidentified = report.unidentified.len(),
                "entities_purged"
            );
        }
        report
    }

    /// True if no MAC appears in more than one table.
    pub fn is_disjoint(&self) -> bool {
        let overlap_ap = self
            .access_points
            .macs()
            .any(|mac| self.stations.contains(&mac) || self.unidentified.contains(&mac));
        let overlap_sta = self.stations.macs().any(|mac| self.unidentified.contains(&mac));
        !overlap_ap && !overlap_sta
    }

    pub(crate) fn access_points_mut(&mut self) -> impl Iterator<Item = &mut AccessPoint> + '_ {
        self.access_points.iter_mut()
    }

    pub(crate) fn stations_mut(&mut self) -> impl Iterator<Item = &mut Station> + '_ {
        self.stations.iter_mut()
    }

    pub(crate) fn unidentified_mut(&mut self) -> impl Iterator<Item = &mut UnidentifiedNode> + '_ {
        self.unidentified.iter_mut()
    }

    pub(crate) fn node_mut(&mut self, mac: &MacAddress) -> Option<&mut UnidentifiedNode> {
        self.unidentified.get_mut(mac)
    }
}
