mod test_session_lifecycle;
