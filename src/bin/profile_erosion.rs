//! Profiling tool for the erosion operators and derived maps

use std::time::{Duration, Instant};

use terrain_forge::derived::{
    aspect_map, curvature_map, flow_map, normal_map, slope_map, AspectParams, CurvatureParams,
    FlowParams, NormalParams, SlopeParams,
};
use terrain_forge::erosion::{self, HydraulicParams, ThermalParams};
use terrain_forge::synth::{NoiseKind, NoiseParams, NoiseSynthesizer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let size = 513;
    let seed = 1337u64;

    println!("=== Performance Profiling ===");
    println!("Field size: {}x{} ({} samples)", size, size, size * size);
    println!();

    let start = Instant::now();
    let synth = NoiseSynthesizer::new(NoiseParams {
        kind: NoiseKind::RidgedMulti,
        seed,
        ..Default::default()
    })?;
    let base = synth.generate(size, size);
    let noise_time = start.elapsed();
    println!("Noise synthesis: {:?}", noise_time);

    let thermal = ThermalParams::default();
    println!("\nThermal: {} passes, talus {}-{}", thermal.iterations, thermal.talus_min, thermal.talus_max);
    let mut field = base.duplicate();
    let start = Instant::now();
    let outcome = erosion::erode_thermal(&mut field, &thermal, None, None, &mut ());
    let thermal_time = start.elapsed();
    println!("Thermal erosion: {:?}", thermal_time);
    println!("  {}", outcome.stats.summary());

    let hydraulic = HydraulicParams::default();
    println!("\nHydraulic: {} steps, rain every {}", hydraulic.iterations, hydraulic.rain_frequency);
    let mut field = base.duplicate();
    let start = Instant::now();
    let (outcome, sediment) = erosion::erode_hydraulic(&mut field, &hydraulic, None, None, &mut ());
    let hydraulic_time = start.elapsed();
    println!("Hydraulic erosion: {:?}", hydraulic_time);
    println!("  {}", outcome.stats.summary());
    println!("  Dissolved: {:.4}", sediment.total());

    println!();
    let mut derived: Vec<(&str, Duration)> = Vec::new();

    let start = Instant::now();
    let _ = slope_map(&field, &SlopeParams::default());
    derived.push(("Slope", start.elapsed()));

    let start = Instant::now();
    let _ = aspect_map(&field, &AspectParams::default());
    derived.push(("Aspect", start.elapsed()));

    let start = Instant::now();
    let _ = curvature_map(&field, &CurvatureParams::default());
    derived.push(("Curvature", start.elapsed()));

    let start = Instant::now();
    let _ = flow_map(&field, &FlowParams::default(), &mut ());
    derived.push(("Flow", start.elapsed()));

    let start = Instant::now();
    let _ = normal_map(&field, &NormalParams::default());
    derived.push(("Normal", start.elapsed()));

    for (name, time) in &derived {
        println!("{} map: {:?}", name, time);
    }

    // Summary
    let derived_time: Duration = derived.iter().map(|(_, t)| *t).sum();
    let total = noise_time + thermal_time + hydraulic_time + derived_time;
    let pct = |d: Duration| 100.0 * d.as_secs_f64() / total.as_secs_f64();
    println!("\n=== Summary ===");
    println!("Noise:        {:>8.2}% ({:?})", pct(noise_time), noise_time);
    println!("Thermal:      {:>8.2}% ({:?})", pct(thermal_time), thermal_time);
    println!("Hydraulic:    {:>8.2}% ({:?})", pct(hydraulic_time), hydraulic_time);
    println!("Derived maps: {:>8.2}% ({:?})", pct(derived_time), derived_time);
    println!("─────────────────────────────────");
    println!("Total:        {:?}", total);

    Ok(())
}
