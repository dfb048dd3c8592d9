// Post-processing composition tests: which optional passes rand1 gates
// into the pipeline.

use viz_core::post::{build_pipeline, PassConfig};

#[test]
fn pipeline_always_opens_with_render_bloom_afterimage() {
    let mut rng = rand::thread_rng();
    for rand1 in 1..=10 {
        let pipeline = build_pipeline(rand1, &mut rng);
        assert_eq!(pipeline.passes[0], PassConfig::Render);
        assert!(matches!(pipeline.passes[1], PassConfig::Bloom { .. }));
        assert!(matches!(pipeline.passes[2], PassConfig::Afterimage { .. }));
    }
}

#[test]
fn bloom_strength_comes_from_the_small_random_range() {
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let pipeline = build_pipeline(3, &mut rng);
        let PassConfig::Bloom {
            strength,
            radius,
            threshold,
        } = pipeline.passes[1]
        else {
            panic!("bloom must be the second pass");
        };
        assert!(strength == 0.1 || strength == 0.2);
        assert_eq!(radius, 0.1);
        assert_eq!(threshold, 0.0);
    }
}

#[test]
fn grayscale_is_gated_on_one_and_eight() {
    let mut rng = rand::thread_rng();
    for rand1 in 1..=10 {
        let pipeline = build_pipeline(rand1, &mut rng);
        assert_eq!(pipeline.has_grayscale(), rand1 == 1 || rand1 == 8);
    }
}

#[test]
fn depth_of_field_requires_rand1_above_seven() {
    let mut rng = rand::thread_rng();
    let pipeline = build_pipeline(7, &mut rng);
    assert!(!pipeline.has_depth_of_field());
    for rand1 in 8..=10 {
        let pipeline = build_pipeline(rand1, &mut rng);
        assert!(pipeline.has_depth_of_field());
    }
}

#[test]
fn film_grain_is_gated_on_even_rand1() {
    let mut rng = rand::thread_rng();
    for rand1 in 1..=10 {
        let pipeline = build_pipeline(rand1, &mut rng);
        assert_eq!(pipeline.has_film(), rand1 % 2 == 0);
    }
}
