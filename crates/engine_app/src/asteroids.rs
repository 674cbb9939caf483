//! Headless asteroid field.
//!
//! A small simulation that exercises the whole engine: entities are created
//! and destroyed every few ticks, components are read and mutated from
//! systems running in parallel, and a lifecycle listener keeps counts.
//!
//! ```text
//! spawner ──► motion ──► wrap ─────┐
//!                   └──► lifetime ─┴──► census
//! ```

use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use glam::Vec2;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use engine_component::{Component, ComponentType, LifecycleEvent, Listener};
use engine_system::{ScheduleError, Scheduler, System};
use engine_world::EntityManager;

/// Field dimensions and population settings.
#[derive(Debug, Clone)]
pub struct FieldConfig {
    pub width: f32,
    pub height: f32,
    /// Number of asteroids the spawner keeps alive.
    pub population: usize,
    pub max_speed: f32,
    /// Asteroids live for a random time in this range, in seconds.
    pub lifetime: (f64, f64),
    /// Seed for the spawner's RNG. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
            population: 20,
            max_speed: 50.0,
            lifetime: (5.0, 20.0),
            seed: None,
        }
    }
}

impl FieldConfig {
    #[must_use]
    pub fn with_population(mut self, population: usize) -> Self {
        self.population = population;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_lifetime(mut self, min: f64, max: f64) -> Self {
        self.lifetime = (min, max);
        self
    }
}

/// Position, velocity and spin of one asteroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f32,
    pub spin: f32,
}

/// Movement state, mutated in place by `motion` and `wrap`.
#[derive(Debug)]
pub struct Kinematics(pub Mutex<Body>);

impl Component for Kinematics {}

/// Seconds left before the asteroid is destroyed.
#[derive(Debug)]
pub struct Lifetime(pub Mutex<f64>);

impl Component for Lifetime {}

/// Component types used by the field, allocated once at setup.
#[derive(Debug, Clone, Copy)]
pub struct FieldTypes {
    pub kinematics: ComponentType,
    pub lifetime: ComponentType,
}

impl FieldTypes {
    fn allocate(world: &EntityManager) -> Self {
        Self {
            kinematics: world.allocate_component_type(),
            lifetime: world.allocate_component_type(),
        }
    }
}

/// Counts asteroid lifecycle events.
#[derive(Debug, Default)]
pub struct FieldStats {
    spawned: AtomicU64,
    destroyed: AtomicU64,
    population: AtomicUsize,
}

impl FieldStats {
    /// Snapshot of the counters.
    #[must_use]
    pub fn summary(&self) -> FieldSummary {
        FieldSummary {
            spawned: self.spawned.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            population: self.population.load(Ordering::Relaxed),
        }
    }
}

impl Listener for FieldStats {
    fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Added { .. } => {
                self.spawned.fetch_add(1, Ordering::Relaxed);
            }
            LifecycleEvent::Destroyed { .. } => {
                self.destroyed.fetch_add(1, Ordering::Relaxed);
            }
            LifecycleEvent::Removed { .. } => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    pub spawned: u64,
    pub destroyed: u64,
    /// Population seen by the last census.
    pub population: usize,
}

/// Keeps the field topped up to the configured population.
struct Spawner {
    world: Arc<EntityManager>,
    types: FieldTypes,
    config: FieldConfig,
    rng: StdRng,
}

impl Spawner {
    fn new_body(&mut self) -> Body {
        let position = Vec2::new(
            self.rng.gen_range(0.0..self.config.width),
            self.rng.gen_range(0.0..self.config.height),
        );
        let heading = self.rng.gen_range(0.0..TAU);
        let speed = self.rng.gen_range(0.0..=self.config.max_speed);
        Body {
            position,
            velocity: Vec2::from_angle(heading) * speed,
            rotation: self.rng.gen_range(0.0..TAU),
            spin: self.rng.gen_range(-0.5..0.5),
        }
    }
}

impl System for Spawner {
    fn name(&self) -> &str {
        "spawner"
    }

    fn update(&mut self, _delta_time: f64) -> anyhow::Result<()> {
        let alive = self.world.count_with(self.types.kinematics);
        let missing = self.config.population.saturating_sub(alive);
        let (min_life, max_life) = self.config.lifetime;

        for _ in 0..missing {
            let body = self.new_body();
            let life = if max_life > min_life {
                self.rng.gen_range(min_life..max_life)
            } else {
                min_life
            };

            let entity = self.world.create();
            self.world
                .add(entity, self.types.kinematics, Kinematics(Mutex::new(body)));
            self.world
                .add(entity, self.types.lifetime, Lifetime(Mutex::new(life)));
        }
        if missing > 0 {
            debug!(spawned = missing, "asteroids spawned");
        }
        Ok(())
    }
}

/// Integrates position and rotation.
struct Motion {
    world: Arc<EntityManager>,
    types: FieldTypes,
}

impl System for Motion {
    fn name(&self) -> &str {
        "motion"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["spawner".to_string()]
    }

    fn update(&mut self, delta_time: f64) -> anyhow::Result<()> {
        let dt = delta_time as f32;
        for entity in self.world.entities_with(&[self.types.kinematics]) {
            let Some(kinematics) = self.world.get::<Kinematics>(entity, self.types.kinematics)
            else {
                continue;
            };
            let mut guard = kinematics.0.lock();
            let body = &mut *guard;
            body.position += body.velocity * dt;
            body.rotation = (body.rotation + body.spin * dt).rem_euclid(TAU);
        }
        Ok(())
    }
}

/// Wraps positions that left the field back in on the opposite edge.
struct Wrap {
    world: Arc<EntityManager>,
    types: FieldTypes,
    bounds: Vec2,
}

impl System for Wrap {
    fn name(&self) -> &str {
        "wrap"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["motion".to_string()]
    }

    fn update(&mut self, _delta_time: f64) -> anyhow::Result<()> {
        for entity in self.world.entities_with(&[self.types.kinematics]) {
            if let Some(kinematics) = self.world.get::<Kinematics>(entity, self.types.kinematics) {
                let mut body = kinematics.0.lock();
                body.position = wrap_into(body.position, self.bounds);
            }
        }
        Ok(())
    }
}

fn wrap_into(position: Vec2, bounds: Vec2) -> Vec2 {
    Vec2::new(
        position.x.rem_euclid(bounds.x),
        position.y.rem_euclid(bounds.y),
    )
}

/// Ages asteroids and destroys the expired ones.
struct Aging {
    world: Arc<EntityManager>,
    types: FieldTypes,
}

impl System for Aging {
    fn name(&self) -> &str {
        "lifetime"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["motion".to_string()]
    }

    fn update(&mut self, delta_time: f64) -> anyhow::Result<()> {
        let mut expired = 0usize;
        for entity in self.world.entities_with(&[self.types.lifetime]) {
            let Some(lifetime) = self.world.get::<Lifetime>(entity, self.types.lifetime) else {
                continue;
            };
            let remaining = {
                let mut left = lifetime.0.lock();
                *left -= delta_time;
                *left
            };
            if remaining <= 0.0 && self.world.destroy(entity) {
                expired += 1;
            }
        }
        if expired > 0 {
            debug!(expired, "asteroids expired");
        }
        Ok(())
    }
}

/// Records the population once the field has settled for the tick.
struct Census {
    world: Arc<EntityManager>,
    types: FieldTypes,
    stats: Arc<FieldStats>,
    ticks: u64,
}

impl System for Census {
    fn name(&self) -> &str {
        "census"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["wrap".to_string(), "lifetime".to_string()]
    }

    fn update(&mut self, _delta_time: f64) -> anyhow::Result<()> {
        let population = self.world.count_with(self.types.kinematics);
        self.stats.population.store(population, Ordering::Relaxed);
        self.ticks += 1;
        if self.ticks % 60 == 0 {
            let summary = self.stats.summary();
            info!(
                population,
                spawned = summary.spawned,
                destroyed = summary.destroyed,
                "asteroid census"
            );
        }
        Ok(())
    }
}

/// Handles to a field installed into a world and scheduler.
#[derive(Debug, Clone)]
pub struct AsteroidField {
    pub types: FieldTypes,
    pub stats: Arc<FieldStats>,
}

impl AsteroidField {
    /// Allocate the field's component types, register its stats listener and
    /// register its systems in dependency order.
    ///
    /// # Errors
    ///
    /// Fails if the scheduler rejects one of the systems.
    pub fn install(
        world: &Arc<EntityManager>,
        scheduler: &Scheduler,
        config: FieldConfig,
    ) -> Result<Self, ScheduleError> {
        let types = FieldTypes::allocate(world);
        let stats = Arc::new(FieldStats::default());
        // Every asteroid carries kinematics, so one listener sees every
        // spawn and every destruction exactly once.
        world.register_interest(types.kinematics, Arc::clone(&stats) as Arc<dyn Listener>);

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let bounds = Vec2::new(config.width, config.height);

        scheduler.register(Spawner {
            world: Arc::clone(world),
            types,
            config,
            rng,
        })?;
        scheduler.register(Motion {
            world: Arc::clone(world),
            types,
        })?;
        scheduler.register(Wrap {
            world: Arc::clone(world),
            types,
            bounds,
        })?;
        scheduler.register(Aging {
            world: Arc::clone(world),
            types,
        })?;
        scheduler.register(Census {
            world: Arc::clone(world),
            types,
            stats: Arc::clone(&stats),
            ticks: 0,
        })?;

        Ok(Self { types, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(config: FieldConfig) -> (Arc<EntityManager>, Scheduler, AsteroidField) {
        let world = Arc::new(EntityManager::new());
        let scheduler = Scheduler::new();
        let field = AsteroidField::install(&world, &scheduler, config).unwrap();
        (world, scheduler, field)
    }

    #[test]
    fn test_systems_form_expected_waves() {
        let (_world, scheduler, _field) = field(FieldConfig::default().with_seed(Some(7)));
        assert_eq!(
            scheduler.plan(),
            vec![
                vec!["spawner".to_string()],
                vec!["motion".to_string()],
                vec!["lifetime".to_string(), "wrap".to_string()],
                vec!["census".to_string()],
            ]
        );
    }

    #[test]
    fn test_population_is_maintained() {
        let config = FieldConfig::default()
            .with_population(12)
            .with_seed(Some(1));
        let (world, scheduler, field) = field(config);

        for _ in 0..30 {
            let report = scheduler.advance(1.0 / 60.0).unwrap();
            assert!(report.is_clean());
        }

        assert_eq!(world.entity_count(), 12);
        let summary = field.stats.summary();
        assert_eq!(summary.population, 12);
        assert_eq!(summary.spawned, 12);
        assert_eq!(summary.destroyed, 0);
    }

    #[test]
    fn test_expired_asteroids_are_replaced() {
        let config = FieldConfig::default()
            .with_population(5)
            .with_lifetime(0.05, 0.05)
            .with_seed(Some(3));
        let (world, scheduler, field) = field(config);

        // Lifetime 0.05s at 0.02s per tick: each asteroid expires on its
        // third tick and is replaced on the next.
        for _ in 0..4 {
            scheduler.advance(0.02).unwrap();
        }

        let summary = field.stats.summary();
        assert_eq!(summary.spawned, 10);
        assert_eq!(summary.destroyed, 5);
        assert_eq!(world.entity_count(), 5);
        assert_eq!(world.created_count(), 10);
    }

    #[test]
    fn test_bodies_stay_inside_the_field() {
        let config = FieldConfig::default()
            .with_population(30)
            .with_seed(Some(11));
        let (world, scheduler, field) = field(config);

        // Large steps push most asteroids past an edge at least once.
        for _ in 0..20 {
            scheduler.advance(3.0).unwrap();
        }

        for entity in world.entities_with(&[field.types.kinematics]) {
            let kinematics = world
                .get::<Kinematics>(entity, field.types.kinematics)
                .unwrap();
            let body = kinematics.0.lock();
            assert!((0.0..=1024.0).contains(&body.position.x), "{body:?}");
            assert!((0.0..=768.0).contains(&body.position.y), "{body:?}");
            assert!((0.0..=TAU).contains(&body.rotation), "{body:?}");
        }
    }

    #[test]
    fn test_wrap_into() {
        let bounds = Vec2::new(100.0, 50.0);
        assert_eq!(wrap_into(Vec2::new(-10.0, 60.0), bounds), Vec2::new(90.0, 10.0));
        assert_eq!(wrap_into(Vec2::new(25.0, 25.0), bounds), Vec2::new(25.0, 25.0));
    }

    #[test]
    fn test_stats_ignore_removals() {
        let stats = FieldStats::default();
        let world = EntityManager::new();
        let t = world.allocate_component_type();
        let e = world.create();
        stats.on_event(&LifecycleEvent::Added { entity: e, component_type: t });
        stats.on_event(&LifecycleEvent::Removed { entity: e, component_type: t });
        assert_eq!(stats.summary().spawned, 1);
        assert_eq!(stats.summary().destroyed, 0);
    }
}
