#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::mock::StepRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use stacking_engine::ensemble::run_ensemble;
    use stacking_engine::metrics::{recomputed_yield, round_usd};
    use stacking_engine::params::FactorRange;
    use stacking_engine::projector::{needs_projection, project};
    use stacking_engine::schedule::{PREPARE_BUFFER, REWARD_PHASE};
    use stacking_engine::{CycleGenerator, CycleRecord, EngineError, GeneratorParams, MicroStx, MAX_GENERATED_CYCLES};

    fn seed_record() -> CycleRecord {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        CycleRecord {
            cycle: 100,
            cycle_start: 1000,
            cycle_rewards_end: 3000,
            stacks_cycle_start: 40_000,
            stacks_cycle_rewards_end: 52_000,
            cycle_start_date: start,
            cycle_rewards_end_date: start + Duration::days(14),
            stx_price_at_end: dec!(2.0),
            btc_price_at_end: dec!(60000),
            btc_rewards: dec!(5),
            fast_pool_v1: dec!(1),
            fast_pool_v2: dec!(1),
            total_stacked: MicroStx(1_000_000_000_000),
            rewards_usd: dec!(300000),
            block_rewards_usd: dec!(300000),
            stacked_usd: dec!(2000000),
            cycle_yield: dec!(0.15),
            apy: 36.8568,
            threshold: 100_000_000_000,
        }
    }

    // ========== Catch-up Trigger ==========

    #[test]
    fn test_no_projection_before_next_cycle_start() {
        let seed = seed_record();
        let mut generator = CycleGenerator::seeded(1);

        assert!(!needs_projection(&seed, 3099));
        assert!(needs_projection(&seed, 3100));

        let projection = project(&[seed.clone()], 3099, &mut generator, MAX_GENERATED_CYCLES).expect("project");
        assert_eq!(projection.generated(), 0);
        assert_eq!(projection.cycles, vec![seed]);
    }

    #[test]
    fn test_empty_store_is_rejected() {
        let mut generator = CycleGenerator::seeded(1);
        let result = project(&[], 10_000, &mut generator, MAX_GENERATED_CYCLES);
        assert!(matches!(result, Err(EngineError::EmptyStore)));
    }

    // ========== Sequencing ==========

    #[test]
    fn test_projection_generates_consecutive_cycles() {
        let mut generator = CycleGenerator::seeded(7);
        // starts at 3100, 5200 and 7300 are all reached
        let projection = project(&[seed_record()], 7300, &mut generator, MAX_GENERATED_CYCLES).expect("project");

        assert_eq!(projection.generated(), 3);
        assert_eq!(projection.cycles.len(), 4);
        for pair in projection.cycles.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert_eq!(next.cycle, prev.cycle + 1);
            assert_eq!(next.cycle_start, prev.cycle_rewards_end + PREPARE_BUFFER);
            assert_eq!(next.cycle_rewards_end, next.cycle_start + REWARD_PHASE);
            assert_eq!(next.cycle_start_date, prev.cycle_rewards_end_date + Duration::days(1));
            assert_eq!(next.cycle_rewards_end_date, next.cycle_start_date + Duration::days(14));
            assert!(next.stacks_cycle_start >= prev.stacks_cycle_rewards_end);
            assert!(next.stacks_cycle_rewards_end > next.stacks_cycle_start);
            assert!(next.threshold >= prev.threshold);
        }
        assert_eq!(projection.new_cycles, projection.cycles[1..].to_vec());
    }

    #[test]
    fn test_generation_bounded_per_refresh() {
        let mut generator = CycleGenerator::seeded(3);
        let projection = project(&[seed_record()], 10_000_000, &mut generator, MAX_GENERATED_CYCLES).expect("project");

        assert_eq!(projection.generated(), MAX_GENERATED_CYCLES);
        let last = projection.cycles.last().expect("non-empty");
        assert_eq!(last.cycle, 110);
        // still behind the chain; the next refresh continues from here
        assert!(needs_projection(last, 10_000_000));
    }

    #[test]
    fn test_long_projection_keeps_apy_finite() {
        // yields drift upward; their 26th power outgrows Decimal well before 160 cycles
        for seed in 1..=3 {
            let mut generator = CycleGenerator::seeded(seed);
            let projection = project(&[seed_record()], 1_000_000, &mut generator, 160).expect("long projection");

            assert_eq!(projection.generated(), 160);
            assert_eq!(projection.cycles.last().map(|c| c.cycle), Some(260));
            assert!(projection.new_cycles.iter().all(|c| c.apy.is_finite() && c.apy >= 0.0));
        }
    }

    // ========== Derived Fields ==========

    #[test]
    fn test_generated_metrics_are_consistent() {
        let mut generator = CycleGenerator::seeded(11);
        let projection = project(&[seed_record()], 30_000, &mut generator, MAX_GENERATED_CYCLES).expect("project");

        for record in &projection.new_cycles {
            let yield_again = round_usd(recomputed_yield(record).expect("yield"));
            assert_eq!(yield_again, record.cycle_yield, "cycle {}", record.cycle);
            assert!(record.apy > 0.0 && record.apy.is_finite());
            assert!(record.stacked_usd > Decimal::ZERO);
            assert!(record.block_rewards_usd > Decimal::ZERO);
        }
    }

    #[test]
    fn test_lowest_draws_hit_range_floors() {
        let mut generator = CycleGenerator::new(StepRng::new(0, 0));
        let next = generator.next_cycle(&seed_record()).expect("next");

        assert_eq!(next.stx_price_at_end, dec!(1.6));
        assert_eq!(next.btc_price_at_end, dec!(54000));
        assert_eq!(next.btc_rewards, dec!(4));
        assert_eq!(next.total_stacked, MicroStx(950_000_000_000));
        assert_eq!(next.threshold, 110_000_000_000);
        assert_eq!(next.stacks_cycle_start, 52_000);
        assert_eq!(next.stacks_cycle_rewards_end, 62_000);
        assert_eq!(next.rewards_usd, dec!(216000));
        assert_eq!(next.stacked_usd, dec!(1520000));
        assert_eq!(next.block_rewards_usd, dec!(194400));
    }

    // ========== Reproducibility ==========

    #[test]
    fn test_same_seed_same_projection() {
        let run = |seed: u64| {
            let mut generator = CycleGenerator::seeded(seed);
            project(&[seed_record()], 20_000, &mut generator, MAX_GENERATED_CYCLES).expect("project")
        };
        assert_eq!(run(42), run(42));
        assert_ne!(run(42).new_cycles, run(43).new_cycles);
    }

    #[test]
    fn test_custom_params_flow_through() {
        let pinned = FactorRange::new(1.0, 1.0);
        let params = GeneratorParams {
            stx_price: pinned,
            btc_price: pinned,
            threshold_step_probability: 1.0,
            ..GeneratorParams::default()
        };
        let rng: ChaCha8Rng = rand::SeedableRng::seed_from_u64(5);
        let mut generator = CycleGenerator::with_params(rng, params);
        let next = generator.next_cycle(&seed_record()).expect("next");

        assert_eq!(next.stx_price_at_end, dec!(2.0));
        assert_eq!(next.btc_price_at_end, dec!(60000));
        assert_eq!(next.threshold, 110_000_000_000);
    }

    // ========== Ensemble ==========

    #[test]
    fn test_ensemble_over_projected_paths() {
        let report = run_ensemble(&[seed_record()], 13, 20, 100, &GeneratorParams::default()).expect("ensemble");

        assert_eq!(report.runs, 20);
        assert_eq!(report.start_cycle, 100);
        assert_eq!(report.final_stx_price.n, 20);
        assert!(report.final_stx_price.ci_lower <= report.final_stx_price.mean);
        assert!(report.final_stx_price.mean <= report.final_stx_price.ci_upper);
        assert!(report.final_stx_price.min > 0.0);
        // thresholds only ever step up
        assert!(report.final_threshold.min >= 100_000.0);
    }
}
