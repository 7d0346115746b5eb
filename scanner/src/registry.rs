use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, error, warn};

use base::defs::{Error, ErrorKind::*, Result};

use crate::frame::PixelBuffer;
use crate::geometry::{FragmentId, Geometry};

pub struct FragmentRecord {
    pub id: FragmentId,
    pub geometry: Rc<Geometry>,
    pub captured_texture: Option<PixelBuffer>,
    /// Session time of the latest successful capture of this fragment.
    pub last_capture_timestamp: Option<Duration>,
}

impl FragmentRecord {
    fn new(id: FragmentId, geometry: Rc<Geometry>) -> Self {
        Self {
            id,
            geometry,
            captured_texture: None,
            last_capture_timestamp: None,
        }
    }
}

/// Live mesh fragments keyed by their spatial-mapping handle.
///
/// Handlers return whether the fragment wants a fresh capture; they never
/// fail, problems with a notification are logged and the notification is
/// dropped.
pub struct FragmentRegistry {
    records: IndexMap<FragmentId, FragmentRecord>,
    throttle: Duration,
}

impl FragmentRegistry {
    pub fn new(throttle: Duration) -> Self {
        Self {
            records: IndexMap::new(),
            throttle,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: FragmentId) -> Option<&FragmentRecord> {
        self.records.get(&id)
    }

    pub fn geometry(&self, id: FragmentId) -> Option<Rc<Geometry>> {
        self.records.get(&id).map(|r| r.geometry.clone())
    }

    pub fn texture(&self, id: FragmentId) -> Option<&PixelBuffer> {
        self.records.get(&id)?.captured_texture.as_ref()
    }

    pub fn ids(&self) -> Vec<FragmentId> {
        self.records.keys().copied().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &FragmentRecord> {
        self.records.values()
    }

    pub fn textures(&self) -> impl Iterator<Item = (FragmentId, &PixelBuffer)> {
        self.records
            .values()
            .filter_map(|r| Some((r.id, r.captured_texture.as_ref()?)))
    }

    pub fn on_fragment_added(
        &mut self,
        id: FragmentId,
        geometry: Option<Rc<Geometry>>,
    ) -> bool {
        let geometry = match geometry {
            Some(geometry) => geometry,
            None => {
                error!("{} added without geometry", id);
                return false;
            }
        };

        if let Some(record) = self.records.get_mut(&id) {
            warn!("{} added twice, keeping its texture", id);
            record.geometry = geometry;
        } else {
            debug!("{} added, {} live", id, self.records.len() + 1);
            self.records.insert(id, FragmentRecord::new(id, geometry));
        }
        true
    }

    pub fn on_fragment_updated(
        &mut self,
        id: FragmentId,
        geometry: Option<Rc<Geometry>>,
        now: Duration,
    ) -> bool {
        let record = match self.records.get_mut(&id) {
            Some(record) => record,
            None => {
                warn!("ignoring update of unknown {}", id);
                return false;
            }
        };
        match geometry {
            Some(geometry) => record.geometry = geometry,
            None => {
                error!("{} updated without geometry", id);
                return false;
            }
        }

        match record.last_capture_timestamp {
            Some(last) => now.saturating_sub(last) >= self.throttle,
            None => true,
        }
    }

    pub fn on_fragment_removed(&mut self, id: FragmentId) {
        match self.records.swap_remove(&id) {
            Some(record) => {
                let textured = record.captured_texture.is_some();
                debug!("{} removed (textured: {})", id, textured);
            }
            None => warn!("ignoring removal of unknown {}", id),
        }
    }

    /// Replaces the fragment's texture captured at `now`; the previous one is
    /// released.
    pub fn store_texture(
        &mut self,
        id: FragmentId,
        texture: PixelBuffer,
        now: Duration,
    ) -> Result<()> {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.captured_texture = Some(texture);
                record.last_capture_timestamp = Some(now);
                Ok(())
            }
            None => {
                let desc = format!("{} was removed before its capture landed", id);
                Err(Error::new(MissingGeometry, desc))
            }
        }
    }
}
