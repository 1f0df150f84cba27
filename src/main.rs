fn main() -> anyhow::Result<()> {
    timetable_tui::cli::run()
}
