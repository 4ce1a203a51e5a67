use super::*;

fn next_toast(rx: &mut broadcast::Receiver<ToastEvent>) -> Toast {
    match rx.try_recv().unwrap() {
        ToastEvent::Show(toast) => toast,
        ToastEvent::Clear => panic!("expected a toast, got clear"),
    }
}

#[test]
fn default_durations_per_kind() {
    assert_eq!(NotificationKind::Success.default_duration(), Duration::from_millis(4000));
    assert_eq!(NotificationKind::Error.default_duration(), Duration::from_millis(6000));
    assert_eq!(NotificationKind::Warning.default_duration(), Duration::from_millis(5000));
    assert_eq!(NotificationKind::Info.default_duration(), Duration::from_millis(4000));
    assert_eq!(NotificationKind::Plain.default_duration(), Duration::from_millis(4000));
}

#[test]
fn publishing_without_listeners_is_silent() {
    let notifier = Notifier::new();
    notifier.success("nobody is listening");
    notifier.clear();
}

#[test]
fn toast_carries_kind_message_and_duration() {
    let notifier = Notifier::new();
    let mut rx = notifier.subscribe();
    notifier.error("falhou");

    let toast = next_toast(&mut rx);
    assert_eq!(toast.kind, NotificationKind::Error);
    assert_eq!(toast.message, "falhou");
    assert_eq!(toast.duration, Duration::from_secs(6));
}

#[test]
fn canned_success_messages_keep_entity_case() {
    let notifier = Notifier::new();
    let mut rx = notifier.subscribe();
    notifier.success_save("Funcionário");
    notifier.success_update("Funcionário");
    notifier.success_delete("Funcionário");

    assert_eq!(next_toast(&mut rx).message, "Funcionário salvo com sucesso!");
    assert_eq!(next_toast(&mut rx).message, "Funcionário atualizado com sucesso!");
    assert_eq!(next_toast(&mut rx).message, "Funcionário excluído com sucesso!");
}

#[test]
fn canned_error_messages_lowercase_entity() {
    let notifier = Notifier::new();
    let mut rx = notifier.subscribe();
    notifier.error_save("Funcionário");
    notifier.error_delete("Funcionário");
    notifier.error_load("Funcionários");

    assert_eq!(next_toast(&mut rx).message, "Erro ao salvar funcionário. Tente novamente.");
    assert_eq!(next_toast(&mut rx).message, "Erro ao excluir funcionário. Tente novamente.");
    let load = next_toast(&mut rx);
    assert_eq!(load.message, "Erro ao carregar funcionários. Verifique sua conexão.");
    assert_eq!(load.kind, NotificationKind::Error);
}

#[test]
fn validation_is_a_warning() {
    let notifier = Notifier::new();
    let mut rx = notifier.subscribe();
    notifier.error_validation();

    let toast = next_toast(&mut rx);
    assert_eq!(toast.kind, NotificationKind::Warning);
    assert_eq!(toast.message, "Por favor, verifique os campos obrigatórios.");
}

#[test]
fn info_loading_defaults_message() {
    let notifier = Notifier::new();
    let mut rx = notifier.subscribe();
    notifier.info_loading(None);
    notifier.info_loading(Some("Carregando funcionários..."));

    assert_eq!(next_toast(&mut rx).message, "Processando...");
    assert_eq!(next_toast(&mut rx).message, "Carregando funcionários...");
}

#[test]
fn clear_is_delivered() {
    let notifier = Notifier::new();
    let mut rx = notifier.subscribe();
    notifier.clear();
    assert_eq!(rx.try_recv().unwrap(), ToastEvent::Clear);
}
