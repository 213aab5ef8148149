//! Choosing which ad to show, and rotating premium ad units.

use std::time::Duration;

use chrono::{DateTime, Utc};

use rand::Rng;

use crate::models::{Ad, PremiumAd};

/// Something that can be served in an ad slot.
pub trait Placement {
    fn is_active(&self) -> bool;

    fn expires_at(&self) -> Option<DateTime<Utc>>;

    /// Whether the ad can be shown at `now`.
    fn is_servable(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at().map(|expires| expires > now).unwrap_or(true)
    }
}

impl Placement for Ad {
    fn is_active(&self) -> bool {
        self.is_active
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl Placement for PremiumAd {
    fn is_active(&self) -> bool {
        self.is_active
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

/// How to pick among several servable ads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// The first one, which is the highest priority when candidates come from
    /// the database.
    Top,
    /// Any one, uniformly at random.
    Random,
}

impl SelectMode {
    pub fn from_random_flag(random: Option<bool>) -> SelectMode {
        if random.unwrap_or(false) {
            SelectMode::Random
        } else {
            SelectMode::Top
        }
    }
}

/// Pick an ad to show from a list of candidates.
///
/// Candidates that can't be served at `now` are never picked, whatever the
/// caller filtered already. Returns `None` when nothing qualifies.
pub fn select_ad<T, R>(candidates: Vec<T>, now: DateTime<Utc>, mode: SelectMode, rng: &mut R) -> Option<T>
where
    T: Placement,
    R: Rng,
{
    let mut servable: Vec<T> = candidates
        .into_iter()
        .filter(|ad| ad.is_servable(now))
        .collect();

    if servable.is_empty() {
        return None;
    }

    let index = match mode {
        SelectMode::Top => 0,
        SelectMode::Random => rng.gen_range(0, servable.len()),
    };

    Some(servable.swap_remove(index))
}

/// A premium unit cycling through a fixed set of ads on a timer.
///
/// Each page view owns its own rotation; nothing here is shared or stored.
#[derive(Debug, Clone)]
pub struct Rotation<T> {
    ads: Vec<T>,
    interval: Duration,
    /// Manual steps taken with `next` and `prev`, added to the timer's index.
    shift: usize,
    dismissed: bool,
}

impl<T> Rotation<T> {
    /// Rotate through `ads`, showing each for `interval`.
    pub fn new(ads: Vec<T>, interval: Duration) -> Rotation<T> {
        Rotation {
            ads,
            interval: interval.max(Duration::from_millis(1)),
            shift: 0,
            dismissed: false,
        }
    }

    pub fn ads(&self) -> &[T] {
        &self.ads
    }

    pub fn into_ads(self) -> Vec<T> {
        self.ads
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed
    }

    /// The index shown `elapsed` after the rotation started.
    pub fn at(&self, elapsed: Duration) -> Option<usize> {
        if self.dismissed || self.ads.is_empty() {
            return None;
        }

        let len = self.ads.len();
        let ticks = (elapsed.as_millis() / self.interval.as_millis()) % len as u128;

        Some((ticks as usize + self.shift) % len)
    }

    /// The ad shown `elapsed` after the rotation started.
    pub fn current(&self, elapsed: Duration) -> Option<&T> {
        self.at(elapsed).and_then(|index| self.ads.get(index))
    }

    /// Skip ahead one ad.
    pub fn next(&mut self) {
        if !self.ads.is_empty() {
            self.shift = (self.shift + 1) % self.ads.len();
        }
    }

    /// Go back one ad.
    pub fn prev(&mut self) {
        if !self.ads.is_empty() {
            let len = self.ads.len();
            self.shift = (self.shift + len - 1) % len;
        }
    }

    /// Hide the unit for the rest of its life.
    pub fn dismiss(&mut self) {
        self.dismissed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration as ChronoDuration;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ad(id: i32, is_active: bool, expires_at: Option<DateTime<Utc>>) -> Ad {
        Ad {
            id,
            title: format!("ad {}", id),
            description: String::new(),
            image_url: None,
            link_url: "https://example.com".into(),
            position: "sidebar".into(),
            category_id: None,
            priority: 0,
            is_active,
            click_count: 0,
            impressions: 0,
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn inactive_and_expired_ads_are_never_selected() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..20 {
            let candidates = vec![
                ad(1, false, None),
                ad(2, true, Some(now - ChronoDuration::minutes(1))),
                ad(3, true, Some(now)),
                ad(4, true, Some(now + ChronoDuration::days(1))),
            ];

            let selected = select_ad(candidates, now, SelectMode::Random, &mut rng);
            assert_eq!(selected.map(|ad| ad.id), Some(4));
        }
    }

    #[test]
    fn nothing_qualifying_selects_nothing() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(1);

        assert!(select_ad(Vec::<Ad>::new(), now, SelectMode::Top, &mut rng).is_none());
        assert!(select_ad(vec![ad(1, false, None)], now, SelectMode::Random, &mut rng).is_none());
    }

    #[test]
    fn top_mode_takes_the_first_servable() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(1);
        let candidates = vec![ad(1, false, None), ad(2, true, None), ad(3, true, None)];

        assert_eq!(
            select_ad(candidates, now, SelectMode::Top, &mut rng).map(|ad| ad.id),
            Some(2)
        );
    }

    #[test]
    fn random_mode_reaches_every_candidate() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(9);
        let mut seen = [false; 3];

        for _ in 0..200 {
            let candidates = vec![ad(0, true, None), ad(1, true, None), ad(2, true, None)];

            if let Some(ad) = select_ad(candidates, now, SelectMode::Random, &mut rng) {
                seen[ad.id as usize] = true;
            }
        }

        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn random_flag_picks_mode() {
        assert_eq!(SelectMode::from_random_flag(None), SelectMode::Top);
        assert_eq!(SelectMode::from_random_flag(Some(false)), SelectMode::Top);
        assert_eq!(SelectMode::from_random_flag(Some(true)), SelectMode::Random);
    }

    #[test]
    fn rotation_follows_the_timer_and_wraps() {
        let rotation = Rotation::new(vec!['a', 'b', 'c'], Duration::from_secs(5));

        assert_eq!(rotation.at(Duration::from_secs(0)), Some(0));
        assert_eq!(rotation.at(Duration::from_secs(4)), Some(0));
        assert_eq!(rotation.at(Duration::from_secs(5)), Some(1));
        assert_eq!(rotation.at(Duration::from_secs(14)), Some(2));
        assert_eq!(rotation.at(Duration::from_secs(15)), Some(0));
        assert_eq!(rotation.current(Duration::from_secs(10)), Some(&'c'));
    }

    #[test]
    fn manual_steps_wrap_both_ways() {
        let mut rotation = Rotation::new(vec![1, 2, 3], Duration::from_secs(5));
        let start = Duration::from_secs(0);

        rotation.prev();
        assert_eq!(rotation.at(start), Some(2));

        rotation.next();
        rotation.next();
        assert_eq!(rotation.at(start), Some(1));

        rotation.next();
        rotation.next();
        assert_eq!(rotation.at(start), Some(0));
    }

    #[test]
    fn dismissed_rotation_shows_nothing() {
        let mut rotation = Rotation::new(vec![1, 2], Duration::from_secs(5));
        rotation.dismiss();

        assert!(rotation.is_dismissed());
        assert_eq!(rotation.at(Duration::from_secs(5)), None);

        rotation.next();
        assert_eq!(rotation.current(Duration::from_secs(0)), None);
    }

    #[test]
    fn empty_rotation_shows_nothing() {
        let mut rotation: Rotation<u8> = Rotation::new(Vec::new(), Duration::from_secs(5));

        rotation.next();
        rotation.prev();
        assert_eq!(rotation.at(Duration::from_secs(100)), None);
    }
}
