use macroquad::prelude::*;
use std::sync::Arc;
use strafe_kinematics::Pose;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::telemetry::PoseUpdate;

pub fn window_conf() -> Conf {
    Conf {
        window_title: "Strafe Field".to_string(),
        window_width: 900,
        window_height: 600,
        high_dpi: true,
        ..Default::default()
    }
}

const FIELD_SCALE: f32 = 60.0; // pixels per meter
const TRAIL_LEN: usize = 600;

fn to_screen(x: f64, y: f64) -> Vec2 {
    Vec2::new(
        screen_width() / 2.0 + x as f32 * FIELD_SCALE,
        screen_height() / 2.0 - y as f32 * FIELD_SCALE,
    )
}

fn draw_robot(pose: &Pose, size: f32, color: Color) {
    let center = to_screen(pose.x, pose.y);
    // Screen y points down, so headings flip.
    let th = -pose.theta as f32;
    let corner = |offset: f32| center + size * Vec2::new((th + offset).cos(), (th + offset).sin());
    let nose = corner(0.0);
    draw_triangle(
        nose,
        corner(2.0 * std::f32::consts::PI / 3.0),
        corner(-2.0 * std::f32::consts::PI / 3.0),
        color,
    );
    draw_line(center.x, center.y, nose.x, nose.y, 2.0, BLACK);
}

fn draw_trail(trail: &[Vec2], color: Color) {
    for pair in trail.windows(2) {
        draw_line(pair[0].x, pair[0].y, pair[1].x, pair[1].y, 1.5, color);
    }
}

fn draw_grid() {
    let (w, h) = (screen_width(), screen_height());
    let origin = to_screen(0.0, 0.0);
    let mut offset = 0.0;
    while offset < w.max(h) {
        for x in [origin.x + offset, origin.x - offset] {
            draw_line(x, 0.0, x, h, 1.0, Color::new(0.0, 0.0, 0.0, 0.08));
        }
        for y in [origin.y + offset, origin.y - offset] {
            draw_line(0.0, y, w, y, 1.0, Color::new(0.0, 0.0, 0.0, 0.08));
        }
        offset += FIELD_SCALE;
    }
}

/// Draws the true, dead-reckoned and fused poses with their recent trails
/// until the pose topic closes.
pub async fn run_visualization_loop(mut pose_rx: broadcast::Receiver<Arc<PoseUpdate>>) {
    let mut latest: Option<Arc<PoseUpdate>> = None;
    let mut truth_trail: Vec<Vec2> = Vec::new();
    let mut fused_trail: Vec<Vec2> = Vec::new();

    info!("Field display started.");

    loop {
        loop {
            match pose_rx.try_recv() {
                Ok(update) => {
                    truth_trail.push(to_screen(update.truth.x, update.truth.y));
                    fused_trail.push(to_screen(update.snapshot.pose.x, update.snapshot.pose.y));
                    latest = Some(update);
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "Field display lagged behind the pose topic.");
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    error!("Pose topic closed. Exiting field display.");
                    return;
                }
            }
        }
        for trail in [&mut truth_trail, &mut fused_trail] {
            if trail.len() > TRAIL_LEN {
                trail.drain(..trail.len() - TRAIL_LEN);
            }
        }

        clear_background(LIGHTGRAY);
        draw_grid();
        draw_trail(&truth_trail, DARKGRAY);
        draw_trail(&fused_trail, BLUE);

        if let Some(update) = &latest {
            let s = &update.snapshot;
            draw_robot(&update.truth, 16.0, GRAY);
            draw_robot(&s.odometry_pose, 12.0, ORANGE);
            draw_robot(&s.pose, 12.0, BLUE);

            draw_text(&format!("t = {:.2} s", s.timestamp), 10.0, 20.0, 20.0, BLACK);
            draw_text(&format!("fused    {}", s.pose), 10.0, 40.0, 20.0, DARKBLUE);
            draw_text(&format!("odometry {}", s.odometry_pose), 10.0, 60.0, 20.0, ORANGE);
            draw_text(&format!("truth    {}", update.truth), 10.0, 80.0, 20.0, DARKGRAY);
            draw_text(&format!("vision   {}", s.stats), 10.0, 100.0, 20.0, BLACK);
        }

        next_frame().await
    }
}
