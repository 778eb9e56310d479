pub fn print_help() {
    println!("\n📄 Document Commands:");
    println!("  list                 - List your documents");
    println!("  open <id>            - Open a document and show its summary");
    println!("  show                 - Show the open document again");
    println!("  upload <file.pdf>    - Upload and process a PDF");
    println!();

    println!("💬 Question Commands:");
    println!("  ask <question>       - Ask about the open document");
    println!("  search <query>       - Find the most relevant passages");
    println!("  agent <query>        - Let the agent pick tools to answer");
    println!("  Example: ask What is the termination notice period?");
    println!();

    println!("⚙️ System Commands:");
    println!("  help  - Show this help menu");
    println!("  exit  - Exit the program");
    println!();
}
