/// Available commands and autocomplete logic

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// Usable before logging in
  pub anonymous: bool,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "dashboard",
    aliases: &["d", "home"],
    description: "Overview and recent changes",
    anonymous: false,
  },
  Command {
    name: "companies",
    aliases: &["c", "co", "company"],
    description: "Tracked companies",
    anonymous: false,
  },
  Command {
    name: "changes",
    aliases: &["ch", "change", "feed"],
    description: "Detected changes",
    anonymous: false,
  },
  Command {
    name: "settings",
    aliases: &["profile", "account"],
    description: "Your profile",
    anonymous: false,
  },
  Command {
    name: "logout",
    aliases: &["signout"],
    description: "End the session",
    anonymous: false,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit pivotwatch",
    anonymous: true,
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_priority(cmd, &input_lower).map(|p| (cmd, p)))
    .collect();

  // Stable, so ties keep declaration order
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better
fn match_priority(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}
