//! Command line front end for a Hue bridge.
//!
//! Reads `HUE_BRIDGE_ADDRESS` and `HUE_APPLICATION_KEY` from the environment.
//! Set `RUST_LOG=hue_home=debug` to see the requests.

use clap::{Parser, Subcommand};
use hue_home::{control, Bridge, BridgeConfig, Home, RType, Resource};

#[derive(Parser)]
#[command(name = "hue-home")]
#[command(about = "Inspect and control the lights behind a Hue bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every zone with its grouped light and member lights
    Home,

    /// Print the state of one light
    Light { id: String },

    /// Switch a light on or off
    ToggleLight { id: String },

    /// Switch a zone's grouped light on or off
    ToggleZone { gid: String },

    /// Set brightness in percent, switching the light on
    Brightness {
        id: String,
        #[arg(value_parser = parse_percent)]
        value: f32,
        /// Treat the id as a grouped light
        #[arg(short, long)]
        group: bool,
    },

    /// Set an RGB colour, fitted to the light's gamut
    Color {
        id: String,
        red: u8,
        green: u8,
        blue: u8,
    },
}

fn parse_percent(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not between 0 and 100"))
    }
}

fn print_home(home: &Home) {
    for view in home.zone_tree() {
        let group = view.group.map(|g| g.id.as_str()).unwrap_or("-");
        println!(
            "{} [{}] group={} {}",
            view.name().unwrap_or("(unnamed)"),
            view.id(),
            group,
            if view.is_on() { "ON" } else { "OFF" }
        );
        for light in &view.lights {
            let brightness = light.dimming.as_ref().map_or(0.0, |d| d.brightness);
            println!(
                "    {} [{}] {} {:.0}%",
                light.name().unwrap_or("(unnamed)"),
                light.id,
                if light.on.on { "ON" } else { "OFF" },
                brightness
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let bridge = Bridge::new(BridgeConfig::from_env()?)?;

    match cli.command {
        Commands::Home => {
            let home = bridge.fetch_home().await.into_result()?;
            if home.is_empty() {
                println!("The bridge reports no lights or zones.");
            }
            print_home(&home);
        }

        Commands::Light { id } => {
            let light = bridge.light(&id).await.single(RType::Light)?;
            println!("{}", light.name().unwrap_or("(unnamed)"));
            println!("  Power: {}", if light.on.on { "ON" } else { "OFF" });
            if let Some(dimming) = &light.dimming {
                println!("  Brightness: {:.0}%", dimming.brightness);
            }
            if let Some(color) = &light.color {
                let [r, g, b] = color.xy.to_rgb8();
                println!("  Color: xy({:.4}, {:.4}) ~ RGB({r}, {g}, {b})", color.xy.x, color.xy.y);
            }
        }

        Commands::ToggleLight { id } => {
            let on = control::toggle_light(&bridge, &id).await?;
            println!("Light {id} is now {}", if on { "ON" } else { "OFF" });
        }

        Commands::ToggleZone { gid } => {
            let on = control::toggle_group(&bridge, &gid).await?;
            println!("Group {gid} is now {}", if on { "ON" } else { "OFF" });
        }

        Commands::Brightness { id, value, group } => {
            if group {
                control::set_group_brightness(&bridge, &id, value).await?;
            } else {
                control::set_light_brightness(&bridge, &id, value).await?;
            }
            println!("Brightness set to {value:.0}%");
        }

        Commands::Color { id, red, green, blue } => {
            let light = bridge.light(&id).await.single(RType::Light)?;
            match control::set_light_color(&bridge, &light, [red, green, blue]).await? {
                Some(xy) => println!("Color set to xy({:.4}, {:.4})", xy.x, xy.y),
                None => println!("Black has no colour; light switched off"),
            }
        }
    }

    Ok(())
}
