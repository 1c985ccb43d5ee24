use crate::world::WorldSnapshot;
use macroquad::prelude::*;
use snake_shared::{Point, Snake, Wall};

const WALL_WIDTH: f32 = 50.0;
const SNAKE_WIDTH: f32 = 10.0;
const POWERUP_RADIUS: f32 = 8.0;

const SNAKE_COLORS: [Color; 8] = [GREEN, RED, BLUE, YELLOW, MAGENTA, ORANGE, PINK, SKYBLUE];

pub fn snake_color(id: i32) -> Color {
    SNAKE_COLORS[id.rem_euclid(SNAKE_COLORS.len() as i32) as usize]
}

/// Screen-space offset that puts `center` in the middle of the window.
pub fn view_offset(center: Point, screen_width: f32, screen_height: f32) -> Vec2 {
    vec2(
        screen_width / 2.0 - center.x as f32,
        screen_height / 2.0 - center.y as f32,
    )
}

/// Bounding rectangle (x, y, w, h) of a wall in world space.
pub fn wall_rect(wall: &Wall) -> Rect {
    let half = WALL_WIDTH / 2.0;
    let min_x = wall.p1.x.min(wall.p2.x) as f32 - half;
    let min_y = wall.p1.y.min(wall.p2.y) as f32 - half;
    let max_x = wall.p1.x.max(wall.p2.x) as f32 + half;
    let max_y = wall.p1.y.max(wall.p2.y) as f32 + half;
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

pub struct Renderer {
    player_name: String,
    offset: Vec2,
}

impl Renderer {
    pub fn new(player_name: &str) -> Self {
        Renderer {
            player_name: player_name.to_string(),
            offset: Vec2::ZERO,
        }
    }

    pub fn render(&mut self, world: &WorldSnapshot, connected: bool) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        let center = world
            .player()
            .and_then(Snake::head)
            .unwrap_or_default();
        self.offset = view_offset(center, screen_width(), screen_height());

        self.draw_border(world);

        for wall in &world.walls {
            self.draw_wall(wall);
        }

        for powerup in world.powerups.values() {
            let p = self.to_screen(powerup.loc);
            draw_circle(p.x, p.y, POWERUP_RADIUS, ORANGE);
            draw_circle_lines(p.x, p.y, POWERUP_RADIUS, 1.0, WHITE);
        }

        for snake in world.dead_snakes.values() {
            self.draw_dead_snake(snake);
        }

        for snake in world.snakes.values() {
            self.draw_snake(snake, snake_color(snake.id));
        }

        self.draw_hud(world, connected);
    }

    fn to_screen(&self, point: Point) -> Vec2 {
        vec2(point.x as f32, point.y as f32) + self.offset
    }

    fn draw_border(&mut self, world: &WorldSnapshot) {
        if let Some(setup) = world.setup {
            let half = setup.size / 2;
            let top_left = self.to_screen(Point::new(-half, -half));
            draw_rectangle_lines(
                top_left.x,
                top_left.y,
                setup.size as f32,
                setup.size as f32,
                2.0,
                Color::from_rgba(68, 68, 68, 255),
            );
        }
    }

    fn draw_wall(&mut self, wall: &Wall) {
        let rect = wall_rect(wall);
        let x = rect.x + self.offset.x;
        let y = rect.y + self.offset.y;
        draw_rectangle(x, y, rect.w, rect.h, Color::from_rgba(120, 120, 120, 255));
        draw_rectangle_lines(x, y, rect.w, rect.h, 2.0, Color::from_rgba(80, 80, 80, 255));
    }

    fn draw_snake(&mut self, snake: &Snake, color: Color) {
        for segment in snake.body.windows(2) {
            let a = self.to_screen(segment[0]);
            let b = self.to_screen(segment[1]);
            draw_line(a.x, a.y, b.x, b.y, SNAKE_WIDTH, color);
            draw_circle(b.x, b.y, SNAKE_WIDTH / 2.0, color);
        }

        if let Some(head) = snake.head() {
            let head = self.to_screen(head);
            let label = format!("{}: {}", snake.name, snake.score);
            draw_text(&label, head.x + 8.0, head.y - 8.0, 16.0, WHITE);
        }
    }

    fn draw_dead_snake(&mut self, snake: &Snake) {
        let faded = Color {
            a: 0.25,
            ..snake_color(snake.id)
        };
        self.draw_snake(snake, faded);

        // Death frame only.
        if snake.died {
            if let Some(head) = snake.head() {
                let head = self.to_screen(head);
                draw_circle(head.x, head.y, 20.0, Color::from_rgba(255, 120, 0, 200));
                draw_circle_lines(head.x, head.y, 30.0, 2.0, YELLOW);
            }
        }
    }

    fn draw_hud(&mut self, world: &WorldSnapshot, connected: bool) {
        let (score, max_score, alive) = world
            .player()
            .map(|player| (player.score, player.max_score, player.alive))
            .unwrap_or((0, 0, false));

        let status = format!(
            "{}  score {}  best {}",
            self.player_name, score, max_score
        );
        draw_text(&status, 10.0, 24.0, 22.0, WHITE);

        let players = format!(
            "{} playing, {} waiting to respawn",
            world.snakes.len(),
            world.dead_snakes.len()
        );
        draw_text(&players, 10.0, 44.0, 16.0, LIGHTGRAY);

        if !connected {
            draw_text("connection lost", 10.0, 64.0, 18.0, RED);
        } else if world.player().is_some() && !alive {
            draw_text("respawning...", 10.0, 64.0, 18.0, YELLOW);
        }
    }
}
