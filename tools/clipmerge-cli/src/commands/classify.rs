//! Classify a display transform.

use clipmerge_composition::classify_orientation;
use clipmerge_media_model::AffineTransform;

pub fn run(a: f64, b: f64, c: f64, d: f64) -> anyhow::Result<()> {
    let orientation = classify_orientation(&AffineTransform::new(a, b, c, d, 0.0, 0.0));
    println!("Orientation: {:?}", orientation.class);
    println!("Portrait: {}", orientation.is_portrait);
    Ok(())
}
