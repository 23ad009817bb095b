//! Renders a small studio scene and saves it as a PNG.
//!
//! Usage: `cargo run --example render_scene -- [output.png]`

use std::time::Duration;

use anyhow::Result;
use sable_core::{
    Camera, Component, Geometry, Light, Material, Mesh, RenderSettings, Scene, ShadowMode, Shape,
    Transform,
};
use sable_math::Vec3;
use sable_raytracer::RayTracer;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let output = std::env::args().nth(1).unwrap_or_else(|| "render.png".to_string());

    let mut scene = build_scene()?;
    let render = RenderSettings::default()
        .with_resolution(640, 360)
        .with_background(Vec3::new(0.05, 0.06, 0.08))
        .with_shadows(ShadowMode::Translucent)
        .with_adaptive_samples(0, 2, 0.04);
    let camera = scene.add_object(
        "camera",
        Transform::looking_at(Vec3::new(0.0, 1.5, 7.0), Vec3::new(0.0, 0.3, 0.0), Vec3::Y),
        Component::Camera(Camera::new(40.0).with_render_settings(render)),
    )?;

    let mut tracer = RayTracer::new(&scene, camera)?;
    while !tracer.is_finished() {
        log::info!("{}%", tracer.progress());
        std::thread::sleep(Duration::from_millis(500));
    }
    tracer.wait();

    tracer.to_image().save(&output)?;
    log::info!("Saved {}", output);
    Ok(())
}

fn build_scene() -> Result<Scene> {
    let mut scene = Scene::new("studio");

    let floor = scene.add_material(Material::diffuse("floor", Vec3::splat(0.6)));
    let clay = scene.add_material(
        Material::diffuse("clay", Vec3::new(0.8, 0.35, 0.2)).with_specular(Vec3::splat(0.3), 64.0),
    );
    let chrome = scene.add_material(Material::mirror("chrome", Vec3::splat(0.85)));
    let glass = scene.add_material(Material::glass("glass", 1.5));

    scene.add_object(
        "floor",
        Transform::from_translation(Vec3::new(0.0, -0.5, 0.0)),
        Component::Geometry(Geometry::new(Shape::Plane, floor)),
    )?;
    scene.add_object(
        "back",
        Transform::from_translation(Vec3::new(0.0, 2.0, -3.0)),
        Component::Geometry(Geometry::mesh(Mesh::quad(12.0, 5.0), floor)),
    )?;
    scene.add_object(
        "clay",
        Transform::from_translation(Vec3::new(-1.6, 0.3, 0.0)),
        Component::Geometry(Geometry::new(Shape::Sphere { radius: 0.8 }, clay)),
    )?;
    scene.add_object(
        "chrome",
        Transform::from_translation(Vec3::new(0.0, 0.3, -0.8)),
        Component::Geometry(Geometry::new(Shape::Sphere { radius: 0.8 }, chrome)),
    )?;
    scene.add_object(
        "glass",
        Transform::from_translation(Vec3::new(1.6, 0.3, 0.4)),
        Component::Geometry(Geometry::new(Shape::Sphere { radius: 0.8 }, glass)),
    )?;

    scene.add_object(
        "key",
        Transform::from_translation(Vec3::new(3.0, 5.0, 4.0)),
        Component::Light(Light::point(Vec3::ONE, 1.0).with_flare_radius(0.2)),
    )?;
    scene.add_object(
        "fill",
        Transform::looking_at(Vec3::new(-4.0, 3.0, 2.0), Vec3::ZERO, Vec3::Y),
        Component::Light(Light::area(2.0, 2.0, Vec3::new(0.6, 0.7, 1.0), 0.5)),
    )?;

    Ok(scene)
}
