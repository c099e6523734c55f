use crate::app::App;
use crate::config::{ChatArea, Coords, PLATFORMS};
use crate::prompts::{LANGUAGE_MIXES, TONES};
use crate::session::{SessionReport, SessionState};
use device_query::{DeviceQuery, DeviceState};
use std::io::{self, Write};

const MODELS: &[(&str, &str)] = &[
    ("command-a-03-2025", "faster"),
    ("command-r-03-2025", "more capable"),
];

fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    if let Err(e) = io::stdout().flush() {
        println!("Error: {}", e);
    }
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(0) => None,
        Ok(_) => Some(input.trim().to_string()),
        Err(e) => {
            println!("Error: {}", e);
            None
        }
    }
}

fn print_report(report: &SessionReport) {
    println!(
        "Session {:?}: {} repl{} sent between {} and {}.",
        report.end,
        report.replies.len(),
        if report.replies.len() == 1 { "y" } else { "ies" },
        report.started_at.format("%T"),
        report.ended_at.format("%T"),
    );
}

/// Reads pointer positions while the user hovers over each element.
pub fn setup_coordinates(app: &mut App) {
    let device_state = DeviceState::new();
    let position = |label: &str| -> Option<Coords> {
        prompt(label)?;
        let (x, y) = device_state.get_mouse().coords;
        Some(Coords(x, y))
    };

    println!("\n--- Coordinate Setup Wizard ---");
    println!("For each step, move your mouse to the right spot and press Enter.");
    let Some(app_coords) = position("1. Hover over the messaging app icon and press Enter...") else {
        return;
    };
    println!("   App icon at: {:?}", app_coords);
    let Some(Coords(start_x, start_y)) =
        position("\n2. Open a chat. Hover over the TOP-LEFT corner of the chat area and press Enter...")
    else {
        return;
    };
    let Some(Coords(end_x, end_y)) =
        position("3. Now hover over the BOTTOM-RIGHT corner of the chat area and press Enter...")
    else {
        return;
    };
    println!("   Chat area from ({start_x}, {start_y}) to ({end_x}, {end_y})");
    let Some(message_box) = position("\n4. Finally, hover over the message input box and press Enter...") else {
        return;
    };
    println!("   Message box at: {:?}", message_box);

    app.settings.app_coords = app_coords;
    app.settings.chat_area = ChatArea {
        start_x,
        start_y,
        end_x,
        end_y,
    };
    app.settings.message_box_coords = message_box;
    if app.save().is_ok() {
        println!("\n--- Coordinates saved! ---");
    }
}

/// One-shot generation against a pasted transcript. A literal `\n` in the
/// input separates lines.
pub async fn test_generation(app: &App, history: &str) {
    let history = history.replace("\\n", "\n");
    println!("Generating response...");
    let reply = app.test_generation(&history).await;
    println!("\n-------------------------");
    println!("AI would respond: {}", reply.text);
    println!("-------------------------");
}

/// Numbered pick from `options`, returning the index. `None` on bad input.
fn choose<T: AsRef<str>>(title: &str, options: &[T]) -> Option<usize> {
    println!("\n--- {title} ---");
    for (idx, option) in options.iter().enumerate() {
        println!("{}. {}", idx + 1, option.as_ref());
    }
    prompt(&format!("Enter your choice (1-{}): ", options.len()))
        .and_then(|c| c.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
        .filter(|idx| *idx < options.len())
}

fn save_and_report(app: &App, message: String) {
    if app.save().is_ok() {
        println!("{message}");
    }
}

fn configure_settings(app: &mut App) {
    println!("\n--- Configure Settings ---");
    println!("1. Select Model (current: {})", app.settings.model);
    println!("2. Set API Timeout (current: {}s)", app.settings.api_timeout);
    println!("3. Toggle Fallback Mode (current: {})", if app.settings.use_fallback_mode { "on" } else { "off" });
    println!("4. Set Your Name (current: {})", app.settings.persona_name);
    println!("5. Select Language Mix (current: {})", app.settings.language_mix);
    println!("6. Select Tone (current: {})", app.settings.tone);
    println!("7. Set Reply Length (current: {} words)", app.settings.max_length);
    println!("8. Set Temperature (current: {})", app.settings.temperature);
    println!("9. Select Platform (current: {})", app.settings.platform);
    println!("10. Back to Main Menu");
    let Some(choice) = prompt("Enter your choice (1-10): ") else {
        return;
    };
    match choice.as_str() {
        "1" => {
            let labels: Vec<String> = MODELS.iter().map(|(model, note)| format!("{model} ({note})")).collect();
            let selected = choose("Select Model", &labels).map(|idx| MODELS[idx]);
            match selected {
                Some((model, _)) => {
                    app.settings.model = model.to_string();
                    save_and_report(app, format!("Model set to {model}"));
                }
                None => println!("Invalid choice. Keeping current model."),
            }
        }
        "2" => {
            let Some(input) = prompt("Enter API timeout in seconds (5-60): ") else {
                return;
            };
            match input.parse::<u64>() {
                Ok(secs) => match app.settings.set_api_timeout(secs) {
                    Ok(()) => save_and_report(app, format!("API timeout set to {secs} seconds")),
                    Err(e) => println!("Invalid timeout: {e}"),
                },
                Err(_) => println!("Invalid input. Please enter a number."),
            }
        }
        "3" => {
            let enabled = app.settings.toggle_fallback_mode();
            save_and_report(app, format!("Fallback mode {}", if enabled { "enabled" } else { "disabled" }));
        }
        "4" => match prompt("Enter your name as it appears in the chat: ").filter(|n| !n.is_empty()) {
            Some(name) => {
                app.settings.persona_name = name;
                save_and_report(app, format!("Name set to {}", app.settings.persona_name));
            }
            None => println!("Keeping current name."),
        },
        "5" => match choose("Select Language Mix", LANGUAGE_MIXES).map(|idx| LANGUAGE_MIXES[idx]) {
            Some(mix) => {
                app.settings.language_mix = mix.to_string();
                save_and_report(app, format!("Language mix set to {mix}"));
            }
            None => println!("Invalid choice. Keeping current language mix."),
        },
        "6" => match choose("Select Tone", TONES).map(|idx| TONES[idx]) {
            Some(tone) => {
                app.settings.tone = tone.to_string();
                save_and_report(app, format!("Tone set to {tone}"));
            }
            None => println!("Invalid choice. Keeping current tone."),
        },
        "7" => {
            let Some(input) = prompt("Enter reply length in words (10-50): ") else {
                return;
            };
            match input.parse::<u32>() {
                Ok(words) => match app.settings.set_max_length(words) {
                    Ok(()) => save_and_report(app, format!("Reply length set to {words} words")),
                    Err(e) => println!("Invalid length: {e}"),
                },
                Err(_) => println!("Invalid input. Please enter a number."),
            }
        }
        "8" => {
            let Some(input) = prompt("Enter temperature (0.0-1.0): ") else {
                return;
            };
            match input.parse::<f64>() {
                Ok(temperature) => match app.settings.set_temperature(temperature) {
                    Ok(()) => save_and_report(app, format!("Temperature set to {temperature}")),
                    Err(e) => println!("Invalid temperature: {e}"),
                },
                Err(_) => println!("Invalid input. Please enter a number."),
            }
        }
        "9" => match choose("Select Platform", PLATFORMS).map(|idx| PLATFORMS[idx]) {
            Some(platform) => {
                app.settings.platform = platform.to_string();
                save_and_report(app, format!("Platform set to {platform}"));
            }
            None => println!("Invalid choice. Keeping current platform."),
        },
        _ => {}
    }
}

pub async fn run_menu(app: &mut App) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n===================================");
    println!("  replypilot: chat auto-reply  ");
    println!("===================================");

    loop {
        if let Some(report) = app.take_finished().await {
            print_report(&report);
        }
        let status = match app.state() {
            SessionState::Running => "RUNNING",
            SessionState::Stopping => "STOPPING",
            SessionState::Idle => "STOPPED",
        };
        println!("\n--- MENU (Status: {status}) ---");
        println!("1. Start Scanning");
        println!("2. Stop Scanning");
        println!("3. Setup Coordinates");
        println!("4. Configure API Key");
        println!("5. Test Response Generation");
        println!("6. Configure Settings");
        println!("7. Exit");

        let Some(choice) = prompt("Enter your choice (1-7): ") else {
            break;
        };
        match choice.as_str() {
            "1" => {
                if let Err(e) = app.start() {
                    println!("Error: {}", e);
                }
            }
            "2" => {
                if let Some(report) = app.stop().await {
                    print_report(&report);
                }
            }
            "3" => setup_coordinates(app),
            "4" => {
                let provider = app.settings.provider;
                if let Some(key) = prompt(&format!("Enter your {provider} API key: ")).filter(|k| !k.is_empty()) {
                    if app.set_api_key(key).is_ok() {
                        println!("API key saved.");
                        if let Some(source) = app.shadowing_key_source() {
                            println!("Note: {source} is set and takes precedence over the saved key.");
                        }
                    }
                }
            }
            "5" => {
                println!("\n--- Test the AI Response ---");
                if let Some(history) = prompt("Paste a sample chat history, then press Enter:\n").filter(|h| !h.is_empty()) {
                    test_generation(app, &history).await;
                }
            }
            "6" => configure_settings(app),
            "7" => break,
            _ => println!("Invalid choice. Please enter 1-7."),
        }
    }
    app.stop().await;
    println!("Exiting...");
    Ok(())
}
